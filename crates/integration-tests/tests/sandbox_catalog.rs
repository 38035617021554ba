//! Read-only catalog walks against a sandbox tenant.
//!
//! These tests require sandbox credentials, plus `MASTER_CATALOG` for the
//! product walk and `SITE_PAIRS` for the search configuration read.
//!
//! Run with: cargo test -p tenant-clone-integration-tests -- --ignored

use std::pin::pin;

use futures::StreamExt;
use tenant_clone_core::{Product, RequestContext};
use tenant_clone_integration_tests::sandbox;
use tenant_clone_sync::pagination::sequence_pages;
use tenant_clone_sync::replicate::fetch_all_json;
use tenant_clone_sync::replicate::search::{REDIRECTS_PATH, SEARCH_SETTINGS_PATH};
use tenant_clone_sync::taxonomy::TaxonomyIndex;
use tenant_clone_sync::{CatalogApi, ResourceApi};

#[tokio::test]
#[ignore = "Requires sandbox tenant credentials"]
async fn test_taxonomy_covers_every_site_catalog() {
    let (config, client) = sandbox().expect("Failed to set up sandbox");
    let tenant = client.tenant().await.expect("Failed to fetch tenant");
    let catalogs = tenant.site_catalog_ids();

    let taxonomy = TaxonomyIndex::build(
        &client,
        RequestContext::tenant(),
        &catalogs,
        config.page_size,
    )
    .await
    .expect("Failed to build taxonomy");

    for catalog in catalogs {
        let index = taxonomy.catalog(catalog).expect("catalog not indexed");
        assert!(!index.is_empty(), "catalog {catalog} has no categories");
    }
}

#[tokio::test]
#[ignore = "Requires sandbox tenant credentials and MASTER_CATALOG"]
async fn test_product_walk_is_ascending() {
    let (config, client) = sandbox().expect("Failed to set up sandbox");
    let master = config.master_catalog.expect("MASTER_CATALOG not set");
    let ctx = RequestContext::tenant().with_master_catalog(master);

    let mut pages = pin!(sequence_pages(
        50,
        |product: &Product| product.product_sequence,
        |after, size| client.products_after(ctx, after, size),
    ));

    let mut last = None;
    // Three pages are enough to cross a cursor boundary
    for _ in 0..3 {
        let Some(page) = pages.next().await else {
            break;
        };
        for product in page.expect("Failed to fetch products") {
            assert!(Some(product.product_sequence) > last);
            last = Some(product.product_sequence);
        }
    }
}

#[tokio::test]
#[ignore = "Requires sandbox tenant credentials and SITE_PAIRS"]
async fn test_source_site_search_configuration_is_readable() {
    let (config, client) = sandbox().expect("Failed to set up sandbox");
    let tenant = client.tenant().await.expect("Failed to fetch tenant");
    let pair = config.site_pairs.first().expect("SITE_PAIRS not set");
    let site = tenant.site(pair.source).expect("source site not in tenant");
    let ctx = RequestContext::tenant().with_site(site.id, site.catalog_id);

    let settings = client
        .get_json(ctx, SEARCH_SETTINGS_PATH)
        .await
        .expect("Failed to read search settings");
    assert!(settings.get("items").is_some_and(serde_json::Value::is_array));

    fetch_all_json(&client, ctx, REDIRECTS_PATH, config.page_size)
        .await
        .expect("Failed to read redirects");
}
