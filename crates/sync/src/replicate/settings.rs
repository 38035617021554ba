//! Site settings replication.

use tenant_clone_core::SitePair;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use super::{ReplicationReport, begin, site_contexts};
use crate::api::{CatalogApi, ResourceApi};
use crate::error::SyncError;

/// Site-scoped settings documents, by name.
pub const SETTINGS_ROUTES: [(&str, &str); 8] = [
    ("cart", "/commerce/settings/cart/cartsettings"),
    ("checkout", "/commerce/settings/checkout"),
    ("fulfillment", "/commerce/settings/fulfillment/fulfillmentsettings"),
    ("general", "/commerce/settings/general"),
    ("inventory", "/commerce/settings/inventory/inventorySettings"),
    ("return", "/commerce/settings/return/returnsettings"),
    ("shipping", "/commerce/settings/shipping"),
    ("subscription", "/commerce/settings/subscription/subscriptionsettings"),
];

/// Copy every settings document from each source site to its destination.
///
/// A document that cannot be read or written is logged and counted as
/// failed; the remaining documents are still copied.
///
/// # Errors
///
/// - `SyncError::Auth` if the client cannot authenticate
/// - `SyncError::MissingSite` if a paired site is not in the tenant
/// - `SyncError::Fetch` if the tenant cannot be read
#[instrument(skip(api, pairs), fields(run_id = %Uuid::new_v4()))]
pub async fn sync_site_settings<A>(
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
        for (name, path) in SETTINGS_ROUTES {
            let body = match api.get_json(source, path).await {
                Ok(body) => body,
                Err(e) => {
                    report.failed += 1;
                    warn!(
                        setting = name,
                        site = ?source.site,
                        status = ?e.status(),
                        error = %e,
                        "Failed to read settings"
                    );
                    continue;
                }
            };
            report.read += 1;

            match api.put_json(destination, path, &body).await {
                Ok(_) => {
                    debug!(setting = name, site = ?destination.site, "Copied settings");
                    report.saved += 1;
                }
                Err(e) => {
                    report.failed += 1;
                    warn!(
                        setting = name,
                        site = ?destination.site,
                        status = ?e.status(),
                        error = %e,
                        "Failed to save settings"
                    );
                }
            }
        }
    }

    report.log("site_settings");
    Ok(report)
}
