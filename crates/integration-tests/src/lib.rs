//! Integration tests for Tenant Clone.
//!
//! These tests talk to a real sandbox tenant and only ever read from it.
//!
//! # Running Tests
//!
//! ```bash
//! # Point the tool at a sandbox tenant (.env is loaded automatically)
//! export API_URL=https://t12345.sandbox.example.com/api
//! export CLIENT_ID=... CLIENT_SECRET=...
//!
//! # Run the ignored live tests
//! cargo test -p tenant-clone-integration-tests -- --ignored
//! ```
//!
//! # Test Categories
//!
//! - `sandbox_auth` - Credential exchange and tenant discovery
//! - `sandbox_catalog` - Category and product walks, search configuration reads

use tenant_clone_sync::{AdminClient, ApiError, CloneConfig, ConfigError};
use thiserror::Error;

/// Errors while preparing a sandbox session.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("Sandbox configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Sandbox client: {0}")]
    Client(#[from] ApiError),
}

/// Load configuration from the environment and build a client for it.
///
/// # Errors
///
/// Returns `SetupError` if the environment is incomplete or the client cannot
/// be built.
pub fn sandbox() -> Result<(CloneConfig, AdminClient), SetupError> {
    let config = CloneConfig::from_env()?;
    let client = AdminClient::new(&config.api)?;
    Ok((config, client))
}
