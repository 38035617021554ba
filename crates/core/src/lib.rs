//! Tenant Clone Core - Shared types library.
//!
//! This crate provides the domain types shared by the sync engine and the CLI:
//! - `sync` - Product synchronization engine and tenant replication jobs
//! - `cli` - Command-line entry point
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients. Every remote
//! record keeps the fields it does not model in an `extra` map, so a record
//! read from the API and written back loses nothing.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, catalog/tenant records, products, request context

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
