//! Catalog-level entity list replication.

use serde_json::Value;
use tenant_clone_core::{RequestContext, SitePair};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{ReplicationReport, begin, copy_collection, fetch_all_json, site_contexts};
use crate::api::{CatalogApi, ResourceApi};
use crate::error::SyncError;

pub const ENTITY_LISTS_PATH: &str = "/platform/entitylists";

/// Copy the entities of every catalog-level entity list from each source
/// site to its destination, keyed by entity `id`.
///
/// Lists scoped to the tenant or a site are not touched. A list whose
/// entities cannot be read is logged and counted as failed.
///
/// # Errors
///
/// - `SyncError::Auth` if the client cannot authenticate
/// - `SyncError::MissingSite` if a paired site is not in the tenant
/// - `SyncError::Fetch` if the tenant or the entity list definitions cannot be
///   read
#[instrument(skip(api, pairs), fields(run_id = %Uuid::new_v4()))]
pub async fn sync_entity_lists<A>(
    api: &A,
    pairs: &[SitePair],
    page_size: u32,
) -> Result<ReplicationReport, SyncError>
where
    A: CatalogApi + ResourceApi + ?Sized,
{
    let tenant = begin(api).await?;
    let contexts = pairs
        .iter()
        .map(|&pair| site_contexts(&tenant, pair))
        .collect::<Result<Vec<_>, _>>()?;

    let lists = fetch_all_json(api, RequestContext::tenant(), ENTITY_LISTS_PATH, page_size)
        .await
        .map_err(|e| SyncError::from_api("entity lists", e))?;
    let names: Vec<String> = lists
        .iter()
        .filter(|list| is_catalog_level(list))
        .filter_map(qualified_name)
        .collect();
    info!(lists = lists.len(), catalog_lists = names.len(), "Found entity lists");

    let mut report = ReplicationReport::default();
    for sites in contexts {
        for name in &names {
            let path = format!("{ENTITY_LISTS_PATH}/{name}/entities");
            match copy_collection(api, sites, &path, "id", page_size, |_| {}).await {
                Ok(copied) => report.merge(copied),
                Err(e) => {
                    report.failed += 1;
                    warn!(
                        list = %name,
                        site = ?sites.0.site,
                        status = ?e.status(),
                        error = %e,
                        "Failed to read entities"
                    );
                }
            }
        }
    }

    report.log("entity_lists");
    Ok(report)
}

fn is_catalog_level(list: &Value) -> bool {
    list.get("contextLevel")
        .and_then(Value::as_str)
        .is_some_and(|level| level.eq_ignore_ascii_case("catalog"))
}

/// `name@nameSpace`, the list's fully qualified name.
fn qualified_name(list: &Value) -> Option<String> {
    let name = list.get("name")?.as_str()?;
    let namespace = list.get("nameSpace")?.as_str()?;
    Some(format!("{name}@{namespace}"))
}
