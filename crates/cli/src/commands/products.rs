//! Product synchronization command.
//!
//! # Environment Variables
//!
//! - `MASTER_CATALOG` - Master catalog the products are read from
//! - `PRIME_CATALOG` - Catalog whose images and categories are authoritative
//! - `CATALOG_PAIRS` - JSON list of `{"source": .., "destination": ..}` catalog ids

use std::sync::Arc;

use tenant_clone_sync::{AdminClient, CloneConfig, ConfigError, ProductSync};

use super::CommandError;

/// Run one product sync pass.
///
/// # Errors
///
/// Returns `CommandError::Config` if the product settings are incomplete and
/// `CommandError::Sync` if the pass aborts.
pub async fn run(client: &AdminClient, config: &CloneConfig) -> Result<(), CommandError> {
    if config.catalog_pairs.is_empty() {
        return Err(ConfigError::MissingEnvVar("CATALOG_PAIRS".to_string()).into());
    }
    let settings = config.product_sync_settings()?;

    ProductSync::new(Arc::new(client.clone()), settings)
        .run()
        .await?;
    Ok(())
}
