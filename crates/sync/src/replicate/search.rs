//! Search configuration replication: default search settings, merchandizing
//! rules and redirects.

use serde_json::Value;
use tenant_clone_core::SitePair;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::{ReplicationReport, begin, copy_collection, key_of, site_contexts};
use crate::api::{CatalogApi, ResourceApi};
use crate::error::SyncError;

pub const SEARCH_SETTINGS_PATH: &str = "/commerce/catalog/admin/search/settings";
pub const MERCHANDIZING_RULES_PATH: &str = "/commerce/catalog/admin/searchmerchandizingrules";
pub const REDIRECTS_PATH: &str = "/commerce/catalog/admin/search/redirect";

/// Copy the default search settings of each source site to its destination.
///
/// Only the entry flagged `isDefault` is copied, keyed by `settingsName`. A
/// site without a default is skipped.
///
/// # Errors
///
/// - `SyncError::Auth` if the client cannot authenticate
/// - `SyncError::MissingSite` if a paired site is not in the tenant
/// - `SyncError::Fetch` if the tenant cannot be read
#[instrument(skip(api, pairs), fields(run_id = %Uuid::new_v4()))]
pub async fn sync_search_settings<A>(
    api: &A,
    pairs: &[SitePair],
) -> Result<ReplicationReport, SyncError>
where
    A: CatalogApi + ResourceApi + ?Sized,
{
    let tenant = begin(api).await?;
    let contexts = pairs
        .iter()
        .map(|&pair| site_contexts(&tenant, pair))
        .collect::<Result<Vec<_>, _>>()?;

    let mut report = ReplicationReport::default();
    for (source, destination) in contexts {
        let listing = match api.get_json(source, SEARCH_SETTINGS_PATH).await {
            Ok(listing) => listing,
            Err(e) => {
                report.failed += 1;
                warn!(
                    site = ?source.site,
                    status = ?e.status(),
                    error = %e,
                    "Failed to read search settings"
                );
                continue;
            }
        };
        report.read += 1;

        let Some(settings) = default_settings(&listing) else {
            info!(site = ?source.site, "No default search settings");
            report.skipped += 1;
            continue;
        };
        let Some(name) = key_of(settings, "settingsName") else {
            warn!(site = ?source.site, "Default search settings have no name");
            report.skipped += 1;
            continue;
        };

        match api
            .upsert_by_key_then_create(destination, SEARCH_SETTINGS_PATH, &name, settings)
            .await
        {
            Ok(_) => {
                debug!(site = ?destination.site, settings_name = %name, "Copied search settings");
                report.saved += 1;
            }
            Err(e) => {
                report.failed += 1;
                warn!(
                    site = ?destination.site,
                    settings_name = %name,
                    status = ?e.status(),
                    error = %e,
                    "Failed to save search settings"
                );
            }
        }
    }

    report.log("search_settings");
    Ok(report)
}

/// Copy every merchandizing rule, keyed by `code`.
///
/// With `strip_prefixes` non-empty, every occurrence of each prefix is removed
/// from every string in the rule (codes, filters, product references) before
/// it is written.
///
/// # Errors
///
/// - `SyncError::Auth` if the client cannot authenticate
/// - `SyncError::MissingSite` if a paired site is not in the tenant
/// - `SyncError::Fetch` if the tenant or a source rule listing cannot be read
#[instrument(skip(api, pairs), fields(run_id = %Uuid::new_v4()))]
pub async fn sync_merchandizing_rules<A>(
    api: &A,
    pairs: &[SitePair],
    strip_prefixes: &[String],
    page_size: u32,
) -> Result<ReplicationReport, SyncError>
where
    A: CatalogApi + ResourceApi + ?Sized,
{
    let tenant = begin(api).await?;
    let mut report = ReplicationReport::default();
    for &pair in pairs {
        let contexts = site_contexts(&tenant, pair)?;
        let copied = copy_collection(
            api,
            contexts,
            MERCHANDIZING_RULES_PATH,
            "code",
            page_size,
            |rule| remove_prefixes(rule, strip_prefixes),
        )
        .await
        .map_err(|e| SyncError::from_api("merchandizing rules", e))?;
        report.merge(copied);
    }
    report.log("merchandizing_rules");
    Ok(report)
}

/// Copy every search redirect, keyed by `redirectId`.
///
/// # Errors
///
/// - `SyncError::Auth` if the client cannot authenticate
/// - `SyncError::MissingSite` if a paired site is not in the tenant
/// - `SyncError::Fetch` if the tenant or a source redirect listing cannot be
///   read
#[instrument(skip(api, pairs), fields(run_id = %Uuid::new_v4()))]
pub async fn sync_redirects<A>(
    api: &A,
    pairs: &[SitePair],
    page_size: u32,
) -> Result<ReplicationReport, SyncError>
where
    A: CatalogApi + ResourceApi + ?Sized,
{
    let tenant = begin(api).await?;
    let mut report = ReplicationReport::default();
    for &pair in pairs {
        let contexts = site_contexts(&tenant, pair)?;
        let copied = copy_collection(api, contexts, REDIRECTS_PATH, "redirectId", page_size, |_| {})
            .await
            .map_err(|e| SyncError::from_api("redirects", e))?;
        report.merge(copied);
    }
    report.log("redirects");
    Ok(report)
}

/// The entry of a settings listing flagged `isDefault`.
fn default_settings(listing: &Value) -> Option<&Value> {
    listing
        .get("items")?
        .as_array()?
        .iter()
        .find(|settings| settings.get("isDefault").and_then(Value::as_bool) == Some(true))
}

/// Remove every occurrence of each prefix from every string in `value`.
///
/// Object keys are left alone.
fn remove_prefixes(value: &mut Value, prefixes: &[String]) {
    let prefixes: Vec<&str> = prefixes
        .iter()
        .map(String::as_str)
        .filter(|prefix| !prefix.is_empty())
        .collect();
    if prefixes.is_empty() {
        return;
    }

    let mut stack = vec![value];
    while let Some(value) = stack.pop() {
        match value {
            Value::String(text) => {
                for &prefix in &prefixes {
                    if text.contains(prefix) {
                        *text = text.replace(prefix, "");
                    }
                }
            }
            Value::Array(items) => stack.extend(items.iter_mut()),
            Value::Object(fields) => stack.extend(fields.values_mut()),
            _ => {}
        }
    }
}
