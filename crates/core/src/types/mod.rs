//! Core types for Tenant Clone.
//!
//! This module provides type-safe wrappers for the catalog domain.

pub mod category;
pub mod context;
pub mod id;
pub mod page;
pub mod price;
pub mod product;
pub mod tenant;

pub use category::Category;
pub use context::RequestContext;
pub use id::*;
pub use page::Page;
pub use price::{CatalogPrice, PLACEHOLDER_PRICE};
pub use product::{CategoryRef, Product, ProductContent, ProductInCatalog};
pub use tenant::{Catalog, CatalogPair, MasterCatalog, Pair, Site, SitePair, Tenant};
