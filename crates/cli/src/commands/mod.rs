//! Subcommand implementations.
//!
//! Every command builds one [`AdminClient`] from the loaded configuration and
//! hands it to the matching job in `tenant_clone_sync`. Reports are logged at
//! info level.

mod products;
mod replicate;

use tenant_clone_sync::{AdminClient, ApiError, CloneConfig, ConfigError, SyncError};
use thiserror::Error;

use crate::Commands;

/// Errors that end a command with a non-zero exit code.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Configuration is missing something this command needs.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The API client could not be built.
    #[error("Client error: {0}")]
    Client(#[from] ApiError),

    /// The job aborted.
    #[error(transparent)]
    Sync(#[from] SyncError),
}

/// Run one subcommand to completion.
///
/// # Errors
///
/// Returns `CommandError` if configuration is incomplete for the command or
/// the job aborts.
pub async fn run(command: Commands, config: &CloneConfig) -> Result<(), CommandError> {
    let client = AdminClient::new(&config.api)?;
    tracing::info!(tenant_id = %client.tenant_id(), ?command, "Starting");

    match command {
        Commands::Products => products::run(&client, config).await?,
        Commands::Categories => replicate::categories(&client, config).await?,
        Commands::CleanCategories => replicate::clean_categories(&client, config).await?,
        Commands::SiteSettings => replicate::site_settings(&client, config).await?,
        Commands::SearchSettings => replicate::search_settings(&client, config).await?,
        Commands::MerchandizingRules { strip_prefixes } => {
            replicate::merchandizing_rules(&client, config, strip_prefixes).await?;
        }
        Commands::Redirects => replicate::redirects(&client, config).await?,
        Commands::Entities => replicate::entities(&client, config).await?,
        Commands::All { strip_prefixes } => {
            // Categories first so product links resolve in every catalog
            replicate::categories(&client, config).await?;
            products::run(&client, config).await?;
            replicate::site_settings(&client, config).await?;
            replicate::search_settings(&client, config).await?;
            replicate::merchandizing_rules(&client, config, strip_prefixes).await?;
            replicate::redirects(&client, config).await?;
            replicate::entities(&client, config).await?;
        }
    }
    Ok(())
}
