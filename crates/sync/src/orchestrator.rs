//! Cross-catalog product synchronization.
//!
//! One pass over every product of the master catalog. For each configured
//! catalog pair the destination entry is made to mirror the source entry:
//! it is created with a placeholder price if missing, product images are
//! backfilled from the prime catalog, and category links are translated from
//! the prime catalog into each catalog by category code. Only products that
//! actually changed are written back, with a bounded number of writes in
//! flight.

use std::collections::HashMap;
use std::pin::pin;
use std::sync::{Arc, OnceLock};
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::StreamExt;
use tenant_clone_core::{
    CatalogId, CatalogPair, CatalogPrice, MasterCatalogId, Product, ProductInCatalog,
    RequestContext, Tenant,
};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::api::CatalogApi;
use crate::diff::Snapshot;
use crate::error::SyncError;
use crate::pagination::sequence_pages;
use crate::scheduler::WriteScheduler;
use crate::taxonomy::TaxonomyIndex;

/// Records between progress log lines.
const PROGRESS_EVERY: usize = 1000;

/// What a product sync run works on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductSyncSettings {
    /// Master catalog the products are read from
    pub master_catalog: MasterCatalogId,
    /// Catalog whose images and categories are authoritative
    pub prime_catalog: CatalogId,
    /// Source → destination catalog pairs
    pub catalog_pairs: Vec<CatalogPair>,
    /// Products per page
    pub page_size: u32,
    /// Maximum concurrent product writes
    pub concurrency: usize,
}

/// Counters for one run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// Products read
    pub scanned: usize,
    /// Products without a prime catalog entry
    pub skipped: usize,
    /// Products that needed no write
    pub unchanged: usize,
    /// Writes handed to the scheduler
    pub submitted: usize,
    /// Writes that succeeded
    pub written: usize,
    /// Writes that failed
    pub failed: usize,
}

/// Result of reconciling one product in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    /// The product has no entry in the prime catalog and was left alone.
    NoPrime,
    /// Every pair was processed.
    Done,
}

/// Product synchronization pass.
pub struct ProductSync<A: ?Sized> {
    api: Arc<A>,
    settings: ProductSyncSettings,
}

impl<A> ProductSync<A>
where
    A: CatalogApi + ?Sized + 'static,
{
    /// Create a sync pass.
    pub const fn new(api: Arc<A>, settings: ProductSyncSettings) -> Self {
        Self { api, settings }
    }

    /// Run the pass to completion.
    ///
    /// Individual write failures are logged and counted in the report. Any
    /// read failure, or a write rejected for bad credentials, ends the run:
    /// writes already in flight are awaited first, then the error is returned.
    ///
    /// # Errors
    ///
    /// - `SyncError::Auth` if the client cannot authenticate, before or
    ///   during the product writes
    /// - `SyncError::MissingCatalog` if a destination catalog is not in the tenant
    /// - `SyncError::Fetch` if the tenant, a category page or a product page
    ///   cannot be read
    #[instrument(
        skip(self),
        fields(
            run_id = %Uuid::new_v4(),
            master_catalog = %self.settings.master_catalog,
            prime_catalog = %self.settings.prime_catalog,
        )
    )]
    pub async fn run(&self) -> Result<SyncReport, SyncError> {
        let settings = &self.settings;

        self.api.authenticate().await.map_err(SyncError::Auth)?;
        let tenant = self
            .api
            .tenant()
            .await
            .map_err(|e| SyncError::from_api("tenant", e))?;
        let currencies = destination_currencies(&tenant, &settings.catalog_pairs)?;

        let ctx = RequestContext::tenant().with_master_catalog(settings.master_catalog);
        let taxonomy = TaxonomyIndex::build(
            self.api.as_ref(),
            ctx,
            &participating_catalogs(settings),
            settings.page_size,
        )
        .await
        .map_err(|e| SyncError::from_api("categories", e))?;

        info!(pairs = settings.catalog_pairs.len(), "Syncing products in catalogs");

        let mut scheduler = WriteScheduler::new(settings.concurrency);
        let written = Arc::new(AtomicUsize::new(0));
        let failed = Arc::new(AtomicUsize::new(0));
        let revoked = Arc::new(OnceLock::new());
        let mut report = SyncReport::default();
        let mut aborted = None;

        let api = self.api.as_ref();
        let mut pages = pin!(sequence_pages(
            settings.page_size,
            |product: &Product| product.product_sequence,
            |after, size| api.products_after(ctx, after, size),
        ));

        'walk: while let Some(page) = pages.next().await {
            let products = match page {
                Ok(products) => products,
                Err(e) => {
                    aborted = Some(SyncError::from_api("products", e));
                    break;
                }
            };

            for mut product in products {
                report.scanned += 1;
                if report.scanned % PROGRESS_EVERY == 0 {
                    info!(
                        scanned = report.scanned,
                        submitted = report.submitted,
                        "Product sync progress"
                    );
                }

                let snapshot = match Snapshot::of(&product) {
                    Ok(snapshot) => snapshot,
                    Err(source) => {
                        aborted = Some(SyncError::Snapshot {
                            code: product.product_code,
                            source,
                        });
                        break 'walk;
                    }
                };

                if reconcile(&mut product, settings, &currencies, &taxonomy) == Reconciled::NoPrime
                {
                    info!(product_code = %product.product_code, "Product not in prime catalog");
                    report.skipped += 1;
                    continue;
                }

                // A serialization error resurfaces in the write
                if !snapshot.changed(&product).unwrap_or(true) {
                    report.unchanged += 1;
                    continue;
                }

                report.submitted += 1;
                let api = Arc::clone(&self.api);
                let written = Arc::clone(&written);
                let failed = Arc::clone(&failed);
                let revoked_by_write = Arc::clone(&revoked);
                scheduler
                    .submit(async move {
                        match api.save_product(ctx, &product).await {
                            Ok(()) => {
                                written.fetch_add(1, Ordering::Relaxed);
                                debug!(product_code = %product.product_code, "Saved product");
                            }
                            Err(e) => {
                                failed.fetch_add(1, Ordering::Relaxed);
                                warn!(
                                    product_code = %product.product_code,
                                    status = ?e.status(),
                                    error = %e,
                                    "Failed to save product"
                                );
                                if e.is_auth() {
                                    let _ = revoked_by_write.set(e);
                                }
                            }
                        }
                    })
                    .await;

                if revoked.get().is_some() {
                    break 'walk;
                }
            }
        }

        scheduler.drain().await;
        report.written = written.load(Ordering::Relaxed);
        report.failed = failed.load(Ordering::Relaxed);

        // Every write task has been reaped, so this is the last handle
        if let Some(e) = Arc::into_inner(revoked).and_then(OnceLock::into_inner) {
            error!(failed = report.failed, "Credentials rejected during product writes");
            return Err(SyncError::Auth(e));
        }
        if let Some(e) = aborted {
            return Err(e);
        }

        info!(
            scanned = report.scanned,
            skipped = report.skipped,
            unchanged = report.unchanged,
            written = report.written,
            failed = report.failed,
            "Product sync complete"
        );
        Ok(report)
    }
}

/// Default currency of every destination catalog.
fn destination_currencies(
    tenant: &Tenant,
    pairs: &[CatalogPair],
) -> Result<HashMap<CatalogId, String>, SyncError> {
    pairs
        .iter()
        .map(|pair| {
            tenant
                .catalog(pair.destination)
                .map(|catalog| (pair.destination, catalog.default_currency_code.clone()))
                .ok_or(SyncError::MissingCatalog(pair.destination))
        })
        .collect()
}

/// Prime catalog first, then every catalog named by a pair.
fn participating_catalogs(settings: &ProductSyncSettings) -> Vec<CatalogId> {
    let mut catalogs = vec![settings.prime_catalog];
    for pair in &settings.catalog_pairs {
        for id in [pair.source, pair.destination] {
            if !catalogs.contains(&id) {
                catalogs.push(id);
            }
        }
    }
    catalogs
}

/// Apply every catalog pair to `product` in memory.
///
/// For each pair with a source entry: images are backfilled from the prime
/// entry, a missing destination entry is cloned from the source with the
/// placeholder price in the destination currency, and both entries get their
/// categories from the prime entry. Pairs without a source entry are skipped.
pub fn reconcile(
    product: &mut Product,
    settings: &ProductSyncSettings,
    currencies: &HashMap<CatalogId, String>,
    taxonomy: &TaxonomyIndex,
) -> Reconciled {
    let Some(prime) = product.catalog_entry(settings.prime_catalog).cloned() else {
        return Reconciled::NoPrime;
    };

    for pair in &settings.catalog_pairs {
        let Some(source) = entry_mut(product, pair.source) else {
            debug!(
                product_code = %product.product_code,
                catalog_id = %pair.source,
                "Product not in source catalog"
            );
            continue;
        };
        backfill_images(&prime, source);
        let source_entry = source.clone();
        taxonomy.remap_entry(&prime, source);

        if let Some(destination) = entry_mut(product, pair.destination) {
            backfill_images(&prime, destination);
        } else {
            let Some(currency) = currencies.get(&pair.destination) else {
                warn!(catalog_id = %pair.destination, "No currency for destination catalog");
                continue;
            };
            let mut destination = source_entry;
            destination.catalog_id = pair.destination;
            destination.price = Some(CatalogPrice::placeholder(currency.as_str()));
            product.product_in_catalogs.push(destination);
        }

        if let Some(destination) = entry_mut(product, pair.destination) {
            taxonomy.remap_entry(&prime, destination);
        }
    }

    Reconciled::Done
}

fn entry_mut(product: &mut Product, catalog_id: CatalogId) -> Option<&mut ProductInCatalog> {
    product
        .product_in_catalogs
        .iter_mut()
        .find(|entry| entry.catalog_id == catalog_id)
}

/// Copy the prime entry's images into `target` when the prime entry has
/// strictly more of them. Targets without content are left alone.
///
/// Returns whether anything was copied.
pub fn backfill_images(prime: &ProductInCatalog, target: &mut ProductInCatalog) -> bool {
    let Some(images) = prime
        .content
        .as_ref()
        .and_then(|content| content.product_images.as_ref())
    else {
        return false;
    };
    if images.len() <= target.image_count() {
        return false;
    }
    let Some(content) = target.content.as_mut() else {
        return false;
    };
    content.product_images = Some(images.clone());
    true
}
