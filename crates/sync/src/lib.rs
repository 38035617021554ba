//! Tenant Clone sync library.
//!
//! Copies catalog data between catalogs and sites of a multi-site commerce
//! tenant through the platform's administrative API.
//!
//! # Product synchronization
//!
//! The core of the crate is [`orchestrator::ProductSync`], which walks every
//! product of the tenant and makes each destination catalog mirror its source
//! catalog:
//!
//! - [`pagination`] walks the live product collection with a sequence cursor
//! - [`taxonomy`] translates category ids between catalogs by category code
//! - [`diff`] decides whether a product actually changed
//! - [`scheduler`] caps the number of concurrent product writes
//!
//! # Replication jobs
//!
//! [`replicate`] holds the single-pass jobs (category tree, category code
//! cleanup, site settings, search configuration, entity lists) built on the
//! shared [`api::ResourceApi`] abstraction.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod config;
pub mod diff;
pub mod error;
pub mod orchestrator;
pub mod pagination;
pub mod replicate;
pub mod scheduler;
pub mod taxonomy;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{AdminClient, ApiError, CatalogApi, ResourceApi};
pub use config::{CloneConfig, ConfigError};
pub use error::SyncError;
pub use orchestrator::{ProductSync, ProductSyncSettings, SyncReport};
pub use replicate::ReplicationReport;
