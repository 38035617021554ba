//! Replication job commands.
//!
//! # Environment Variables
//!
//! - `CATALOG_PAIRS` - Catalog pairs for `categories`
//! - `SITE_PAIRS` - JSON list of `{"source": .., "destination": ..}` site ids
//!   for the site-scoped jobs
//! - `CATEGORY_CODE_PREFIXES` - Prefixes removed by `clean-categories` and
//!   `--strip-prefixes`

use tenant_clone_core::SitePair;
use tenant_clone_sync::replicate;
use tenant_clone_sync::{AdminClient, CloneConfig, ConfigError};

use super::CommandError;

fn site_pairs(config: &CloneConfig) -> Result<&[SitePair], ConfigError> {
    if config.site_pairs.is_empty() {
        return Err(ConfigError::MissingEnvVar("SITE_PAIRS".to_string()));
    }
    Ok(&config.site_pairs)
}

pub async fn categories(client: &AdminClient, config: &CloneConfig) -> Result<(), CommandError> {
    if config.catalog_pairs.is_empty() {
        return Err(ConfigError::MissingEnvVar("CATALOG_PAIRS".to_string()).into());
    }
    replicate::sync_category_tree(client, &config.catalog_pairs, config.page_size).await?;
    Ok(())
}

pub async fn clean_categories(
    client: &AdminClient,
    config: &CloneConfig,
) -> Result<(), CommandError> {
    replicate::clean_category_codes(
        client,
        &config.category_code_prefixes,
        config.page_size,
    )
    .await?;
    Ok(())
}

pub async fn site_settings(client: &AdminClient, config: &CloneConfig) -> Result<(), CommandError> {
    replicate::sync_site_settings(client, site_pairs(config)?).await?;
    Ok(())
}

pub async fn search_settings(
    client: &AdminClient,
    config: &CloneConfig,
) -> Result<(), CommandError> {
    replicate::sync_search_settings(client, site_pairs(config)?).await?;
    Ok(())
}

pub async fn merchandizing_rules(
    client: &AdminClient,
    config: &CloneConfig,
    strip_prefixes: bool,
) -> Result<(), CommandError> {
    let prefixes: &[String] = if strip_prefixes {
        &config.category_code_prefixes
    } else {
        &[]
    };
    replicate::sync_merchandizing_rules(
        client,
        site_pairs(config)?,
        prefixes,
        config.page_size,
    )
    .await?;
    Ok(())
}

pub async fn redirects(client: &AdminClient, config: &CloneConfig) -> Result<(), CommandError> {
    replicate::sync_redirects(client, site_pairs(config)?, config.page_size).await?;
    Ok(())
}

pub async fn entities(client: &AdminClient, config: &CloneConfig) -> Result<(), CommandError> {
    replicate::sync_entity_lists(client, site_pairs(config)?, config.page_size).await?;
    Ok(())
}
