//! Run-level errors.

use tenant_clone_core::{CatalogId, SiteId};
use thiserror::Error;

use crate::api::ApiError;

/// Errors that abort a sync or replication run.
///
/// Failures of individual writes are not errors at this level; they are
/// logged and counted, and the run carries on.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Could not authenticate with the admin API.
    #[error("Authentication failed: {0}")]
    Auth(#[source] ApiError),

    /// A read the run depends on failed.
    #[error("Failed to fetch {what}: {source}")]
    Fetch {
        what: &'static str,
        #[source]
        source: ApiError,
    },

    /// A configured catalog does not exist in the tenant.
    #[error("Catalog {0} not found in tenant")]
    MissingCatalog(CatalogId),

    /// A configured site does not exist in the tenant.
    #[error("Site {0} not found in tenant")]
    MissingSite(SiteId),

    /// A product could not be snapshotted for change detection.
    #[error("Failed to serialize product {code}: {source}")]
    Snapshot {
        code: String,
        #[source]
        source: serde_json::Error,
    },
}

impl SyncError {
    /// Wrap an API error from the read named `what`.
    ///
    /// Credential failures become [`SyncError::Auth`] wherever they surface.
    #[must_use]
    pub fn from_api(what: &'static str, err: ApiError) -> Self {
        if err.is_auth() {
            Self::Auth(err)
        } else {
            Self::Fetch { what, source: err }
        }
    }
}
