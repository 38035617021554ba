//! Single-pass replication jobs.
//!
//! Each job reads a resource family from a source catalog or site and writes
//! it to the destination. A failed read or write of one record is logged and
//! counted; the job moves on. Only authentication, the tenant read and the
//! initial collection reads are fatal.

pub mod categories;
pub mod entities;
pub mod search;
pub mod settings;

use std::pin::pin;

use futures::StreamExt;
use serde_json::Value;
use tenant_clone_core::{Page, RequestContext, SitePair, Tenant};
use tracing::{debug, info, warn};

use crate::api::{ApiError, CatalogApi, ResourceApi};
use crate::error::SyncError;
use crate::pagination::offset_pages;

pub use categories::{clean_category_codes, sync_category_tree};
pub use entities::sync_entity_lists;
pub use search::{sync_merchandizing_rules, sync_redirects, sync_search_settings};
pub use settings::sync_site_settings;

/// Counters for one replication job.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplicationReport {
    /// Records read from the source
    pub read: usize,
    /// Records written to the destination
    pub saved: usize,
    /// Records created in the destination
    pub created: usize,
    /// Records with nothing to do
    pub skipped: usize,
    /// Reads or writes that failed
    pub failed: usize,
}

impl ReplicationReport {
    /// Add another job's counters to this one.
    pub const fn merge(&mut self, other: Self) {
        self.read += other.read;
        self.saved += other.saved;
        self.created += other.created;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }

    fn log(&self, job: &'static str) {
        info!(
            job,
            read = self.read,
            saved = self.saved,
            created = self.created,
            skipped = self.skipped,
            failed = self.failed,
            "Replication complete"
        );
    }
}

/// Authenticate and load the tenant.
async fn begin<A>(api: &A) -> Result<Tenant, SyncError>
where
    A: CatalogApi + ?Sized,
{
    api.authenticate().await.map_err(SyncError::Auth)?;
    api.tenant()
        .await
        .map_err(|e| SyncError::from_api("tenant", e))
}

/// Request contexts of a site pair's source and destination.
fn site_contexts(
    tenant: &Tenant,
    pair: SitePair,
) -> Result<(RequestContext, RequestContext), SyncError> {
    let context = |id| {
        tenant
            .site(id)
            .map(|site| RequestContext::tenant().with_site(site.id, site.catalog_id))
            .ok_or(SyncError::MissingSite(id))
    };
    Ok((context(pair.source)?, context(pair.destination)?))
}

/// Append paging parameters to `path`.
fn paged_path(path: &str, start_index: u64, page_size: u32) -> String {
    let separator = if path.contains('?') { '&' } else { '?' };
    format!("{path}{separator}startIndex={start_index}&pageSize={page_size}")
}

/// Read every item of a stable JSON collection.
///
/// # Errors
///
/// Returns the first failed page fetch.
pub async fn fetch_all_json<R>(
    api: &R,
    ctx: RequestContext,
    path: &str,
    page_size: u32,
) -> Result<Vec<Value>, ApiError>
where
    R: ResourceApi + ?Sized,
{
    let mut pages = pin!(offset_pages(page_size, |start, size| {
        let url = paged_path(path, start, size);
        async move {
            let body = api.get_json(ctx, &url).await?;
            Ok::<_, ApiError>(serde_json::from_value::<Page<Value>>(body)?)
        }
    }));

    let mut items = Vec::new();
    while let Some(page) = pages.next().await {
        items.extend(page?);
    }
    Ok(items)
}

/// Upsert every record of a keyed collection from `source` into `destination`.
///
/// `rewrite` runs on each record before its key is read. Records without a
/// key are skipped; write failures are logged and counted.
///
/// # Errors
///
/// Returns the error of the source collection read.
async fn copy_collection<R, F>(
    api: &R,
    (source, destination): (RequestContext, RequestContext),
    path: &str,
    key_field: &str,
    page_size: u32,
    rewrite: F,
) -> Result<ReplicationReport, ApiError>
where
    R: ResourceApi + ?Sized,
    F: Fn(&mut Value),
{
    let records = fetch_all_json(api, source, path, page_size).await?;
    let mut report = ReplicationReport {
        read: records.len(),
        ..ReplicationReport::default()
    };

    for mut record in records {
        rewrite(&mut record);
        let Some(key) = key_of(&record, key_field) else {
            debug!(path, key_field, "Record without key");
            report.skipped += 1;
            continue;
        };
        match api
            .upsert_by_key_then_create(destination, path, &key, &record)
            .await
        {
            Ok(_) => report.saved += 1,
            Err(e) => {
                report.failed += 1;
                warn!(
                    path,
                    key = %key,
                    status = ?e.status(),
                    error = %e,
                    "Failed to save record"
                );
            }
        }
    }
    Ok(report)
}

/// String form of a record's key field. Numeric keys are rendered in decimal.
fn key_of(record: &Value, field: &str) -> Option<String> {
    match record.get(field)? {
        Value::String(key) if !key.is_empty() => Some(key.clone()),
        Value::Number(key) => Some(key.to_string()),
        _ => None,
    }
}
