//! Catalog admin API access.
//!
//! Two traits describe everything the sync engine and the replication jobs
//! need from the remote service:
//!
//! - [`CatalogApi`] - typed access to tenants, categories and products
//! - [`ResourceApi`] - untyped JSON resources (settings, rules, redirects,
//!   entities) with the platform's PUT-then-POST upsert convention
//!
//! [`AdminClient`] implements both over HTTPS. Every call takes a
//! [`RequestContext`] by value; there is no ambient catalog or site selector.
//!
//! # Authentication
//!
//! Client id/secret are exchanged for a bearer token by [`auth::SessionCache`],
//! which keeps the token until it expires.

pub mod auth;
pub mod client;

pub use client::AdminClient;

use async_trait::async_trait;
use serde_json::Value;
use tenant_clone_core::{Category, Page, Product, RequestContext, Tenant};
use thiserror::Error;
use tracing::debug;

/// Errors that can occur when talking to the catalog admin API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed before a response arrived.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API answered with a non-success status.
    #[error("API error: {status} - {message}")]
    Status { status: u16, message: String },

    /// The bearer token was rejected.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Client credentials could not be exchanged for a token.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// A request URL or header could not be built.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ApiError {
    /// HTTP status of the failed call, when the server answered.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Unauthorized(_) => Some(401),
            Self::Http(err) => err.status().map(|status| status.as_u16()),
            _ => None,
        }
    }

    /// Whether the failure means the run cannot authenticate at all.
    #[must_use]
    pub const fn is_auth(&self) -> bool {
        matches!(self, Self::AuthenticationFailed(_))
    }
}

/// Typed catalog operations used by the product sync and category jobs.
#[async_trait]
pub trait CatalogApi: Send + Sync {
    /// Make sure a valid session exists.
    async fn authenticate(&self) -> Result<(), ApiError>;

    /// The tenant the client is bound to.
    async fn tenant(&self) -> Result<Tenant, ApiError>;

    /// One page of the categories of `ctx.catalog`, by offset.
    async fn categories(
        &self,
        ctx: RequestContext,
        start_index: u64,
        page_size: u32,
    ) -> Result<Page<Category>, ApiError>;

    /// Update an existing category (`PUT .../categories/{id}`).
    async fn save_category(
        &self,
        ctx: RequestContext,
        category: &Category,
    ) -> Result<Category, ApiError>;

    /// Create a category (`POST .../categories/`). Returns it with its new id.
    async fn create_category(
        &self,
        ctx: RequestContext,
        category: &Category,
    ) -> Result<Category, ApiError>;

    /// Products with `productSequence` greater than `after`, ascending.
    ///
    /// `total_count` of the returned page counts every product matching the
    /// filter, including those beyond this page.
    async fn products_after(
        &self,
        ctx: RequestContext,
        after: Option<i64>,
        page_size: u32,
    ) -> Result<Page<Product>, ApiError>;

    /// Upsert a product (`PUT .../products/{code}`).
    async fn save_product(&self, ctx: RequestContext, product: &Product) -> Result<(), ApiError>;
}

/// Untyped JSON resources addressed by path relative to the API root.
#[async_trait]
pub trait ResourceApi: Send + Sync {
    /// `GET {path}`.
    async fn get_json(&self, ctx: RequestContext, path: &str) -> Result<Value, ApiError>;

    /// `PUT {path}` with a JSON body.
    async fn put_json(&self, ctx: RequestContext, path: &str, body: &Value)
    -> Result<Value, ApiError>;

    /// `POST {path}` with a JSON body.
    async fn post_json(
        &self,
        ctx: RequestContext,
        path: &str,
        body: &Value,
    ) -> Result<Value, ApiError>;

    /// Upsert `body` under `collection/{key}`.
    ///
    /// Tries `PUT` on the keyed path first; if the server answers with an error
    /// status (typically 404 for a record that does not exist yet) the body is
    /// `POST`ed to the collection instead. Transport errors are not retried.
    async fn upsert_by_key_then_create(
        &self,
        ctx: RequestContext,
        collection: &str,
        key: &str,
        body: &Value,
    ) -> Result<Value, ApiError> {
        let keyed = format!("{collection}/{}", urlencoding::encode(key));
        match self.put_json(ctx, &keyed, body).await {
            Ok(saved) => Ok(saved),
            Err(err) if err.status().is_some() => {
                debug!(path = %keyed, error = %err, "PUT rejected, creating instead");
                self.post_json(ctx, collection, body).await
            }
            Err(err) => Err(err),
        }
    }
}
