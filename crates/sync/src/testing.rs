//! In-memory admin API for unit tests.
#![allow(clippy::unwrap_used)]

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{Value, json};
use tenant_clone_core::{
    Category, CatalogId, CategoryId, Page, Product, RequestContext, SiteId, Tenant,
};

use crate::api::{ApiError, CatalogApi, ResourceApi};

/// Resources are partitioned by catalog and site, like the real service.
type Scope = (Option<CatalogId>, Option<SiteId>);

const fn scope(ctx: RequestContext) -> Scope {
    (ctx.catalog, ctx.site)
}

fn not_found(path: &str) -> ApiError {
    ApiError::Status {
        status: 404,
        message: format!("{path} not found"),
    }
}

/// A keyed JSON collection (`PUT {path}/{key}`, `POST {path}`).
#[derive(Debug, Clone)]
struct Collection {
    key_field: &'static str,
    items: Vec<Value>,
}

/// One recorded call: verb, path, context.
pub type Call = (&'static str, String, RequestContext);

#[derive(Default)]
struct State {
    tenant: Option<Tenant>,
    categories: HashMap<CatalogId, Vec<Category>>,
    next_category_id: i32,
    products: Vec<Product>,
    saved_products: Vec<(RequestContext, Product)>,
    failing_codes: HashSet<String>,
    revoked_on_save: bool,
    fail_auth: bool,
    product_pages_before_failure: Option<usize>,
    documents: HashMap<(Scope, String), Value>,
    collections: HashMap<(Scope, String), Collection>,
    calls: Vec<Call>,
}

/// Fake implementation of [`CatalogApi`] and [`ResourceApi`].
#[derive(Default)]
pub struct FakeApi {
    state: Mutex<State>,
}

impl FakeApi {
    pub fn new() -> Self {
        let api = Self::default();
        api.state.lock().unwrap().next_category_id = 1000;
        api
    }

    pub fn set_tenant(&self, tenant: Value) {
        self.state.lock().unwrap().tenant = Some(serde_json::from_value(tenant).unwrap());
    }

    pub fn add_categories(&self, catalog: CatalogId, categories: impl IntoIterator<Item = Category>) {
        self.state
            .lock()
            .unwrap()
            .categories
            .entry(catalog)
            .or_default()
            .extend(categories);
    }

    pub fn categories_of(&self, catalog: CatalogId) -> Vec<Category> {
        self.state
            .lock()
            .unwrap()
            .categories
            .get(&catalog)
            .cloned()
            .unwrap_or_default()
    }

    pub fn add_products(&self, products: impl IntoIterator<Item = Product>) {
        let mut state = self.state.lock().unwrap();
        state.products.extend(products);
        state.products.sort_by_key(|p| p.product_sequence);
    }

    pub fn saved_products(&self) -> Vec<(RequestContext, Product)> {
        self.state.lock().unwrap().saved_products.clone()
    }

    pub fn fail_saving(&self, product_code: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_codes
            .insert(product_code.to_string());
    }

    /// Reject every product write as if the credentials were revoked.
    pub fn revoke_on_save(&self) {
        self.state.lock().unwrap().revoked_on_save = true;
    }

    pub fn fail_auth(&self) {
        self.state.lock().unwrap().fail_auth = true;
    }

    /// Serve `pages` product pages, then fail every later one.
    pub fn fail_product_pages_after(&self, pages: usize) {
        self.state.lock().unwrap().product_pages_before_failure = Some(pages);
    }

    pub fn set_document(&self, ctx: RequestContext, path: &str, body: Value) {
        self.state
            .lock()
            .unwrap()
            .documents
            .insert((scope(ctx), path.to_string()), body);
    }

    pub fn document(&self, ctx: RequestContext, path: &str) -> Option<Value> {
        self.state
            .lock()
            .unwrap()
            .documents
            .get(&(scope(ctx), path.to_string()))
            .cloned()
    }

    pub fn add_collection(
        &self,
        ctx: RequestContext,
        path: &str,
        key_field: &'static str,
        items: Vec<Value>,
    ) {
        self.state
            .lock()
            .unwrap()
            .collections
            .insert((scope(ctx), path.to_string()), Collection { key_field, items });
    }

    pub fn collection(&self, ctx: RequestContext, path: &str) -> Vec<Value> {
        self.state
            .lock()
            .unwrap()
            .collections
            .get(&(scope(ctx), path.to_string()))
            .map(|c| c.items.clone())
            .unwrap_or_default()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    fn record(&self, verb: &'static str, path: &str, ctx: RequestContext) {
        self.state
            .lock()
            .unwrap()
            .calls
            .push((verb, path.to_string(), ctx));
    }
}

fn key_matches(item: &Value, field: &str, key: &str) -> bool {
    match item.get(field) {
        Some(Value::String(value)) => value == key,
        Some(Value::Number(value)) => value.to_string() == key,
        _ => false,
    }
}

fn query_param(query: &str, name: &str) -> Option<usize> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .and_then(|(_, value)| value.parse().ok())
}

#[async_trait]
impl CatalogApi for FakeApi {
    async fn authenticate(&self) -> Result<(), ApiError> {
        if self.state.lock().unwrap().fail_auth {
            return Err(ApiError::AuthenticationFailed("HTTP 401: bad secret".to_string()));
        }
        Ok(())
    }

    async fn tenant(&self) -> Result<Tenant, ApiError> {
        self.record("GET", "/platform/tenants", RequestContext::tenant());
        self.state
            .lock()
            .unwrap()
            .tenant
            .clone()
            .ok_or_else(|| not_found("tenant"))
    }

    async fn categories(
        &self,
        ctx: RequestContext,
        start_index: u64,
        page_size: u32,
    ) -> Result<Page<Category>, ApiError> {
        self.record("GET", "/categories", ctx);
        let state = self.state.lock().unwrap();
        let all = ctx
            .catalog
            .and_then(|catalog| state.categories.get(&catalog))
            .cloned()
            .unwrap_or_default();
        let total = all.len() as u64;
        let items = all
            .into_iter()
            .skip(usize::try_from(start_index).unwrap())
            .take(page_size as usize)
            .collect();
        Ok(Page::new(items, total))
    }

    async fn save_category(
        &self,
        ctx: RequestContext,
        category: &Category,
    ) -> Result<Category, ApiError> {
        self.record("PUT", "/categories", ctx);
        let mut state = self.state.lock().unwrap();
        let existing = ctx
            .catalog
            .and_then(|catalog| state.categories.get_mut(&catalog))
            .and_then(|categories| categories.iter_mut().find(|c| c.id == category.id))
            .ok_or_else(|| not_found("category"))?;
        *existing = category.clone();
        Ok(category.clone())
    }

    async fn create_category(
        &self,
        ctx: RequestContext,
        category: &Category,
    ) -> Result<Category, ApiError> {
        self.record("POST", "/categories", ctx);
        let catalog = ctx
            .catalog
            .ok_or_else(|| ApiError::InvalidRequest("no catalog".to_string()))?;
        let mut state = self.state.lock().unwrap();
        state.next_category_id += 1;
        let mut created = category.clone();
        created.id = Some(CategoryId::new(state.next_category_id));
        state
            .categories
            .entry(catalog)
            .or_default()
            .push(created.clone());
        Ok(created)
    }

    async fn products_after(
        &self,
        ctx: RequestContext,
        after: Option<i64>,
        page_size: u32,
    ) -> Result<Page<Product>, ApiError> {
        self.record("GET", "/products", ctx);
        let mut state = self.state.lock().unwrap();
        if let Some(remaining) = state.product_pages_before_failure.as_mut() {
            if *remaining == 0 {
                return Err(ApiError::Status {
                    status: 503,
                    message: "Service Unavailable".to_string(),
                });
            }
            *remaining -= 1;
        }
        let matching: Vec<Product> = state
            .products
            .iter()
            .filter(|p| after.is_none_or(|after| p.product_sequence > after))
            .cloned()
            .collect();
        let total = matching.len() as u64;
        Ok(Page::new(
            matching.into_iter().take(page_size as usize).collect(),
            total,
        ))
    }

    async fn save_product(&self, ctx: RequestContext, product: &Product) -> Result<(), ApiError> {
        self.record("PUT", "/products", ctx);
        // Let other writes interleave
        tokio::task::yield_now().await;
        let mut state = self.state.lock().unwrap();
        if state.revoked_on_save {
            return Err(ApiError::AuthenticationFailed(
                "HTTP 401: secret revoked".to_string(),
            ));
        }
        if state.failing_codes.contains(&product.product_code) {
            return Err(ApiError::Status {
                status: 500,
                message: "Internal Server Error".to_string(),
            });
        }
        if let Some(stored) = state
            .products
            .iter_mut()
            .find(|p| p.product_code == product.product_code)
        {
            *stored = product.clone();
        }
        state.saved_products.push((ctx, product.clone()));
        Ok(())
    }
}

#[async_trait]
impl ResourceApi for FakeApi {
    async fn get_json(&self, ctx: RequestContext, path: &str) -> Result<Value, ApiError> {
        self.record("GET", path, ctx);
        let (base, query) = path.split_once('?').unwrap_or((path, ""));
        let state = self.state.lock().unwrap();

        if let Some(collection) = state.collections.get(&(scope(ctx), base.to_string())) {
            let total = collection.items.len();
            let start = query_param(query, "startIndex").unwrap_or(0);
            let size = query_param(query, "pageSize").unwrap_or(total);
            let items: Vec<Value> = collection.items.iter().skip(start).take(size).cloned().collect();
            return Ok(json!({ "items": items, "totalCount": total }));
        }

        state
            .documents
            .get(&(scope(ctx), base.to_string()))
            .cloned()
            .ok_or_else(|| not_found(path))
    }

    async fn put_json(
        &self,
        ctx: RequestContext,
        path: &str,
        body: &Value,
    ) -> Result<Value, ApiError> {
        self.record("PUT", path, ctx);
        let mut state = self.state.lock().unwrap();

        if let Some((parent, key)) = path.rsplit_once('/')
            && let Some(collection) = state.collections.get_mut(&(scope(ctx), parent.to_string()))
        {
            let key = urlencoding::decode(key).unwrap();
            let field = collection.key_field;
            let existing = collection
                .items
                .iter_mut()
                .find(|item| key_matches(item, field, &key))
                .ok_or_else(|| not_found(path))?;
            *existing = body.clone();
            return Ok(body.clone());
        }

        state
            .documents
            .insert((scope(ctx), path.to_string()), body.clone());
        Ok(body.clone())
    }

    async fn post_json(
        &self,
        ctx: RequestContext,
        path: &str,
        body: &Value,
    ) -> Result<Value, ApiError> {
        self.record("POST", path, ctx);
        let mut state = self.state.lock().unwrap();
        let collection = state
            .collections
            .get_mut(&(scope(ctx), path.to_string()))
            .ok_or_else(|| not_found(path))?;
        collection.items.push(body.clone());
        Ok(body.clone())
    }
}
