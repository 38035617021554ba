//! Category tree replication and category code cleanup.

use std::collections::{HashMap, HashSet};

use tenant_clone_core::{CatalogId, CatalogPair, Category, CategoryId, RequestContext};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::{ReplicationReport, begin};
use crate::api::{ApiError, CatalogApi};
use crate::error::SyncError;
use crate::pagination::{collect_all, offset_pages};

/// Make every destination catalog's category tree match its source.
///
/// Categories missing from the destination (by code) are created, parents
/// before children, with `parentCategoryId` resolved in the destination.
/// Existing categories whose parent differs from the source are re-parented.
///
/// # Errors
///
/// - `SyncError::Auth` if the client cannot authenticate
/// - `SyncError::MissingCatalog` if a paired catalog is not in the tenant
/// - `SyncError::Fetch` if the tenant or a category listing cannot be read
#[instrument(skip(api, pairs), fields(run_id = %Uuid::new_v4()))]
pub async fn sync_category_tree<A>(
    api: &A,
    pairs: &[CatalogPair],
    page_size: u32,
) -> Result<ReplicationReport, SyncError>
where
    A: CatalogApi + ?Sized,
{
    let tenant = begin(api).await?;
    for pair in pairs {
        for id in [pair.source, pair.destination] {
            if tenant.catalog(id).is_none() {
                return Err(SyncError::MissingCatalog(id));
            }
        }
    }

    let mut report = ReplicationReport::default();
    for &pair in pairs {
        report.merge(sync_pair(api, pair, page_size).await?);
    }
    report.log("category_tree");
    Ok(report)
}

#[instrument(skip(api), fields(source = %pair.source, destination = %pair.destination))]
async fn sync_pair<A>(
    api: &A,
    pair: CatalogPair,
    page_size: u32,
) -> Result<ReplicationReport, SyncError>
where
    A: CatalogApi + ?Sized,
{
    let source_ctx = RequestContext::tenant().with_catalog(pair.source);
    let destination_ctx = RequestContext::tenant().with_catalog(pair.destination);

    let source = read_categories(api, source_ctx, page_size)
        .await
        .map_err(|e| SyncError::from_api("source categories", e))?;
    let mut destination: HashMap<String, Category> =
        read_categories(api, destination_ctx, page_size)
            .await
            .map_err(|e| SyncError::from_api("destination categories", e))?
            .into_iter()
            .filter_map(|category| Some((category.category_code.clone()?, category)))
            .collect();

    let mut report = ReplicationReport {
        read: source.len(),
        ..ReplicationReport::default()
    };
    let by_code: HashMap<&str, &Category> = source
        .iter()
        .filter_map(|category| Some((category.code()?, category)))
        .collect();

    let mut missing: Vec<&Category> = source
        .iter()
        .filter(|category| category.code().is_some_and(|code| !destination.contains_key(code)))
        .collect();
    missing.sort_by_cached_key(|category| depth(category, &by_code));

    let mut created = HashSet::new();
    for category in missing {
        let Some(code) = category.code() else {
            continue;
        };
        let mut body = category.clone();
        body.id = None;
        body.parent_category_id = parent_id(category, &destination);

        match api.create_category(destination_ctx, &body).await {
            Ok(saved) => {
                debug!(category_code = code, "Created category");
                report.created += 1;
                created.insert(code);
                destination.insert(code.to_string(), saved);
            }
            Err(e) => {
                report.failed += 1;
                warn!(
                    category_code = code,
                    status = ?e.status(),
                    error = %e,
                    "Failed to create category"
                );
            }
        }
    }

    for category in &source {
        let Some(code) = category.code() else {
            debug!(id = ?category.id, "Category without code");
            report.skipped += 1;
            continue;
        };
        let Some(existing) = destination.get(code) else {
            continue;
        };
        if existing.parent_code() == category.parent_code() {
            if !created.contains(code) {
                report.skipped += 1;
            }
            continue;
        }

        let mut moved = existing.clone();
        moved.parent_category_code = category.parent_category_code.clone();
        moved.parent_category_id = parent_id(category, &destination);

        match api.save_category(destination_ctx, &moved).await {
            Ok(saved) => {
                debug!(
                    category_code = code,
                    parent = ?category.parent_code(),
                    "Re-parented category"
                );
                report.saved += 1;
                destination.insert(code.to_string(), saved);
            }
            Err(e) => {
                report.failed += 1;
                warn!(
                    category_code = code,
                    status = ?e.status(),
                    error = %e,
                    "Failed to re-parent category"
                );
            }
        }
    }

    info!(
        created = report.created,
        saved = report.saved,
        failed = report.failed,
        "Category tree synced"
    );
    Ok(report)
}

/// Strip the first matching prefix from every category code of every site
/// catalog.
///
/// Each catalog is read in full before anything is saved.
///
/// # Errors
///
/// - `SyncError::Auth` if the client cannot authenticate
/// - `SyncError::Fetch` if the tenant or a category listing cannot be read
#[instrument(skip(api), fields(run_id = %Uuid::new_v4()))]
pub async fn clean_category_codes<A>(
    api: &A,
    prefixes: &[String],
    page_size: u32,
) -> Result<ReplicationReport, SyncError>
where
    A: CatalogApi + ?Sized,
{
    let tenant = begin(api).await?;
    let mut report = ReplicationReport::default();

    for catalog in tenant.site_catalog_ids() {
        report.merge(clean_catalog(api, catalog, prefixes, page_size).await?);
    }
    report.log("category_cleanup");
    Ok(report)
}

async fn clean_catalog<A>(
    api: &A,
    catalog: CatalogId,
    prefixes: &[String],
    page_size: u32,
) -> Result<ReplicationReport, SyncError>
where
    A: CatalogApi + ?Sized,
{
    let ctx = RequestContext::tenant().with_catalog(catalog);
    let categories = read_categories(api, ctx, page_size)
        .await
        .map_err(|e| SyncError::from_api("categories", e))?;
    let mut report = ReplicationReport {
        read: categories.len(),
        ..ReplicationReport::default()
    };

    for mut category in categories {
        let Some(stripped) = category.code().and_then(|code| strip_prefix(code, prefixes)) else {
            report.skipped += 1;
            continue;
        };
        debug!(
            catalog_id = %catalog,
            from = ?category.category_code,
            to = %stripped,
            "Renaming category code"
        );
        category.category_code = Some(stripped);

        match api.save_category(ctx, &category).await {
            Ok(_) => report.saved += 1,
            Err(e) => {
                report.failed += 1;
                warn!(
                    catalog_id = %catalog,
                    id = ?category.id,
                    status = ?e.status(),
                    error = %e,
                    "Failed to save category"
                );
            }
        }
    }
    Ok(report)
}

async fn read_categories<A>(
    api: &A,
    ctx: RequestContext,
    page_size: u32,
) -> Result<Vec<Category>, ApiError>
where
    A: CatalogApi + ?Sized,
{
    collect_all(offset_pages(page_size, |start, size| {
        api.categories(ctx, start, size)
    }))
    .await
}

/// `code` without the first matching prefix. A code that is nothing but a
/// prefix is left alone.
fn strip_prefix(code: &str, prefixes: &[String]) -> Option<String> {
    prefixes
        .iter()
        .filter(|prefix| !prefix.is_empty())
        .find_map(|prefix| code.strip_prefix(prefix.as_str()))
        .filter(|rest| !rest.is_empty())
        .map(str::to_string)
}

/// Destination id of a source category's parent.
fn parent_id(
    category: &Category,
    destination: &HashMap<String, Category>,
) -> Option<CategoryId> {
    category
        .parent_code()
        .and_then(|parent| destination.get(parent))
        .and_then(|parent| parent.id)
}

/// Number of ancestors reachable through `by_code`. Cycles stop the count.
fn depth(category: &Category, by_code: &HashMap<&str, &Category>) -> usize {
    let mut depth = 0;
    let mut parent = category.parent_code();
    while let Some(code) = parent {
        if depth > by_code.len() {
            break;
        }
        depth += 1;
        parent = by_code.get(code).and_then(|c| c.parent_code());
    }
    depth
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::testing::FakeApi;

    fn category(id: Option<i32>, code: &str, parent: Option<(i32, &str)>) -> Category {
        let mut value = json!({ "categoryCode": code, "content": { "name": code } });
        if let Some(id) = id {
            value["id"] = json!(id);
        }
        if let Some((parent_id, parent_code)) = parent {
            value["parentCategoryId"] = json!(parent_id);
            value["parentCategoryCode"] = json!(parent_code);
        }
        serde_json::from_value(value).unwrap()
    }

    fn api() -> FakeApi {
        let api = FakeApi::new();
        api.set_tenant(json!({
            "id": 1,
            "sites": [
                { "id": 100, "catalogId": 2 },
                { "id": 101, "catalogId": 2 },
                { "id": 200, "catalogId": 3 }
            ],
            "masterCatalogs": [{
                "id": 1,
                "catalogs": [
                    { "id": 2, "defaultCurrencyCode": "KWD" },
                    { "id": 3, "defaultCurrencyCode": "AED" }
                ]
            }]
        }));
        api
    }

    fn find<'a>(categories: &'a [Category], code: &str) -> &'a Category {
        categories.iter().find(|c| c.code() == Some(code)).unwrap()
    }

    const PAIR: CatalogPair = CatalogPair::new(CatalogId::new(2), CatalogId::new(3));

    #[tokio::test]
    async fn test_missing_categories_are_created_parent_first() {
        let api = api();
        // Children listed before their parents
        api.add_categories(
            CatalogId::new(2),
            [
                category(Some(3), "DRESSES", Some((2, "WOMEN"))),
                category(Some(2), "WOMEN", Some((1, "ROOT"))),
                category(Some(1), "ROOT", None),
            ],
        );

        let report = sync_category_tree(&api, &[PAIR], 200).await.unwrap();
        assert_eq!(report.created, 3);
        assert_eq!(report.failed, 0);

        let created = api.categories_of(CatalogId::new(3));
        let order: Vec<_> = created.iter().filter_map(Category::code).collect();
        assert_eq!(order, ["ROOT", "WOMEN", "DRESSES"]);

        let root = find(&created, "ROOT");
        let women = find(&created, "WOMEN");
        let dresses = find(&created, "DRESSES");
        assert_eq!(root.parent_category_id, None);
        assert_eq!(women.parent_category_id, root.id);
        assert_eq!(dresses.parent_category_id, women.id);
        assert_ne!(women.id, Some(CategoryId::new(2)), "source ids are not reused");
        assert_eq!(dresses.extra["content"]["name"], "DRESSES");
    }

    #[tokio::test]
    async fn test_moved_categories_are_reparented() {
        let api = api();
        api.add_categories(
            CatalogId::new(2),
            [
                category(Some(1), "ROOT", None),
                category(Some(2), "SALE", None),
                category(Some(3), "SHOES", Some((1, "ROOT"))),
            ],
        );
        api.add_categories(
            CatalogId::new(3),
            [
                category(Some(10), "ROOT", None),
                category(Some(11), "SALE", None),
                category(Some(12), "SHOES", Some((11, "SALE"))),
            ],
        );

        let report = sync_category_tree(&api, &[PAIR], 200).await.unwrap();
        assert_eq!(report.created, 0);
        assert_eq!(report.saved, 1);
        assert_eq!(report.skipped, 2);

        let destination = api.categories_of(CatalogId::new(3));
        let shoes = find(&destination, "SHOES");
        assert_eq!(shoes.id, Some(CategoryId::new(12)));
        assert_eq!(shoes.parent_code(), Some("ROOT"));
        assert_eq!(shoes.parent_category_id, Some(CategoryId::new(10)));
    }

    #[tokio::test]
    async fn test_second_run_changes_nothing() {
        let api = api();
        api.add_categories(
            CatalogId::new(2),
            [
                category(Some(1), "ROOT", None),
                category(Some(2), "WOMEN", Some((1, "ROOT"))),
            ],
        );

        sync_category_tree(&api, &[PAIR], 200).await.unwrap();
        let report = sync_category_tree(&api, &[PAIR], 200).await.unwrap();
        assert_eq!(report.created, 0);
        assert_eq!(report.saved, 0);
        assert_eq!(report.skipped, 2);
    }

    #[tokio::test]
    async fn test_unknown_catalog_is_rejected() {
        let api = api();
        let pair = CatalogPair::new(CatalogId::new(2), CatalogId::new(42));
        let err = sync_category_tree(&api, &[pair], 200).await.unwrap_err();
        assert!(matches!(err, SyncError::MissingCatalog(id) if id == CatalogId::new(42)));
    }

    #[tokio::test]
    async fn test_cleanup_strips_prefixes_in_every_site_catalog() {
        let api = api();
        api.add_categories(
            CatalogId::new(2),
            [
                category(Some(1), "KW-EN-SHOES", None),
                category(Some(2), "BAGS", None),
            ],
        );
        api.add_categories(CatalogId::new(3), [category(Some(5), "KW-AR-SHOES", None)]);
        let prefixes = vec!["KW-EN-".to_string(), "KW-AR-".to_string()];

        let report = clean_category_codes(&api, &prefixes, 200).await.unwrap();
        assert_eq!(report.read, 3);
        assert_eq!(report.saved, 2);
        assert_eq!(report.skipped, 1);

        let codes = |catalog| {
            api.categories_of(CatalogId::new(catalog))
                .iter()
                .filter_map(|c| c.category_code.clone())
                .collect::<Vec<_>>()
        };
        assert_eq!(codes(2), ["SHOES", "BAGS"]);
        assert_eq!(codes(3), ["SHOES"]);

        // Catalog 2 backs two sites but is cleaned once
        let reads = api
            .calls()
            .iter()
            .filter(|(verb, path, ctx)| {
                *verb == "GET" && path == "/categories" && ctx.catalog == Some(CatalogId::new(2))
            })
            .count();
        assert_eq!(reads, 1);
    }

    #[test]
    fn test_strip_prefix() {
        let prefixes = vec![String::new(), "KW-EN-".to_string()];
        assert_eq!(strip_prefix("KW-EN-SHOES", &prefixes).as_deref(), Some("SHOES"));
        assert_eq!(strip_prefix("SHOES", &prefixes), None);
        assert_eq!(strip_prefix("KW-EN-", &prefixes), None);
    }

    #[test]
    fn test_depth_survives_cycles() {
        let a = category(Some(1), "A", Some((2, "B")));
        let b = category(Some(2), "B", Some((1, "A")));
        let by_code: HashMap<&str, &Category> = [("A", &a), ("B", &b)].into_iter().collect();
        assert!(depth(&a, &by_code) <= 3);
    }
}
