//! HTTPS implementation of the catalog admin API.

use std::sync::Arc;

use async_trait::async_trait;
use moka::future::Cache;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tenant_clone_core::{Category, Page, Product, RequestContext, Tenant, TenantId};
use tracing::{debug, instrument};

use super::auth::{OAuthExchange, SessionCache};
use super::{ApiError, CatalogApi, ResourceApi};
use crate::config::ApiConfig;

const CATEGORIES_PATH: &str = "/commerce/catalog/admin/categories";
const PRODUCTS_PATH: &str = "/commerce/catalog/admin/products";

/// Scope headers understood by the platform.
const MASTER_CATALOG_HEADER: &str = "x-vol-master-catalog";
const CATALOG_HEADER: &str = "x-vol-catalog";
const SITE_HEADER: &str = "x-vol-site";

/// Catalog admin API client.
///
/// Cheap to clone; clones share the connection pool, the session and the
/// tenant cache.
///
/// # Authentication
///
/// A bearer token is obtained on first use and reused until it expires. A
/// `401`/`403` answer drops the cached token so the next call re-authenticates;
/// the failed call itself is not retried.
#[derive(Clone)]
pub struct AdminClient {
    inner: Arc<AdminClientInner>,
}

struct AdminClientInner {
    client: reqwest::Client,
    api_root: String,
    tenant_id: TenantId,
    session: SessionCache<OAuthExchange>,
    tenants: Cache<TenantId, Tenant>,
}

impl AdminClient {
    /// Create a client for the configured tenant.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::InvalidRequest` if the API root is not a URL and
    /// `ApiError::Http` if the HTTP client (or its proxy) cannot be built.
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        url::Url::parse(&config.api_root)
            .map_err(|e| ApiError::InvalidRequest(format!("Invalid API root: {e}")))?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let mut builder = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout);
        if let Some(proxy) = &config.proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy.as_str())?);
        }
        let client = builder.build()?;

        let api_root = config.api_root.trim_end_matches('/').to_string();
        let session = SessionCache::new(OAuthExchange::new(
            client.clone(),
            &api_root,
            config.client_id.clone(),
            config.client_secret.clone(),
        ));

        Ok(Self {
            inner: Arc::new(AdminClientInner {
                client,
                api_root,
                tenant_id: config.tenant_id,
                session,
                tenants: Cache::new(16),
            }),
        })
    }

    /// The tenant this client is bound to.
    #[must_use]
    pub fn tenant_id(&self) -> TenantId {
        self.inner.tenant_id
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{path}", self.inner.api_root)
        } else {
            format!("{}/{path}", self.inner.api_root)
        }
    }

    /// Attach the scope headers of `ctx` to a request.
    fn scoped(builder: reqwest::RequestBuilder, ctx: RequestContext) -> reqwest::RequestBuilder {
        let mut builder = builder;
        if let Some(master_catalog) = ctx.master_catalog {
            builder = builder.header(MASTER_CATALOG_HEADER, master_catalog.to_string());
        }
        if let Some(catalog) = ctx.catalog {
            builder = builder.header(CATALOG_HEADER, catalog.to_string());
        }
        if let Some(site) = ctx.site {
            builder = builder.header(SITE_HEADER, site.to_string());
        }
        builder
    }

    /// Authorize, scope and send a request.
    async fn send(
        &self,
        builder: reqwest::RequestBuilder,
        ctx: RequestContext,
    ) -> Result<reqwest::Response, ApiError> {
        let token = self.inner.session.token().await?;
        let response = Self::scoped(builder, ctx)
            .bearer_auth(token.expose_secret())
            .send()
            .await?;
        Ok(response)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        ctx: RequestContext,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let builder = self.inner.client.get(self.url(path)).query(query);
        let response = self.send(builder, ctx).await?;
        self.handle_response(response).await
    }

    async fn put<T: DeserializeOwned, B: serde::Serialize + Sync>(
        &self,
        ctx: RequestContext,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let builder = self.inner.client.put(self.url(path)).json(body);
        let response = self.send(builder, ctx).await?;
        self.handle_response(response).await
    }

    async fn post<T: DeserializeOwned, B: serde::Serialize + Sync>(
        &self,
        ctx: RequestContext,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let builder = self.inner.client.post(self.url(path)).json(body);
        let response = self.send(builder, ctx).await?;
        self.handle_response(response).await
    }

    /// Handle API response and parse JSON.
    ///
    /// An empty success body parses as `null`.
    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let status = response.status();

        if status.is_success() {
            let body = response.bytes().await?;
            if body.is_empty() {
                return Ok(serde_json::from_value(Value::Null)?);
            }
            return Ok(serde_json::from_slice(&body)?);
        }

        Err(self.parse_error(response).await)
    }

    /// Parse error response from the API.
    async fn parse_error(&self, response: reqwest::Response) -> ApiError {
        let status = response.status().as_u16();

        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        if status == 401 || status == 403 {
            self.inner.session.invalidate().await;
            return ApiError::Unauthorized(message);
        }

        ApiError::Status { status, message }
    }
}

impl std::fmt::Debug for AdminClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminClient")
            .field("api_root", &self.inner.api_root)
            .field("tenant_id", &self.inner.tenant_id)
            .finish_non_exhaustive()
    }
}

/// Query for the products whose sequence is above `after`, in sequence order.
fn products_query(after: Option<i64>, page_size: u32) -> Vec<(&'static str, String)> {
    let mut query = vec![
        ("pageSize", page_size.to_string()),
        ("sortBy", "productSequence asc".to_string()),
    ];
    if let Some(after) = after {
        query.push(("filter", format!("productSequence gt {after}")));
    }
    query
}

#[async_trait]
impl CatalogApi for AdminClient {
    #[instrument(skip(self))]
    async fn authenticate(&self) -> Result<(), ApiError> {
        self.inner.session.token().await.map(|_| ())
    }

    #[instrument(skip(self), fields(tenant_id = %self.inner.tenant_id))]
    async fn tenant(&self) -> Result<Tenant, ApiError> {
        let id = self.inner.tenant_id;
        if let Some(tenant) = self.inner.tenants.get(&id).await {
            return Ok(tenant);
        }

        let tenant: Tenant = self
            .get(RequestContext::tenant(), &format!("/platform/tenants/{id}"), &[])
            .await?;
        debug!(
            sites = tenant.sites.len(),
            master_catalogs = tenant.master_catalogs.len(),
            "Loaded tenant"
        );
        self.inner.tenants.insert(id, tenant.clone()).await;
        Ok(tenant)
    }

    #[instrument(skip(self), fields(catalog_id = ?ctx.catalog))]
    async fn categories(
        &self,
        ctx: RequestContext,
        start_index: u64,
        page_size: u32,
    ) -> Result<Page<Category>, ApiError> {
        let query = [
            ("startIndex", start_index.to_string()),
            ("pageSize", page_size.to_string()),
        ];
        self.get(ctx, CATEGORIES_PATH, &query).await
    }

    #[instrument(skip(self, category), fields(category_code = ?category.code()))]
    async fn save_category(
        &self,
        ctx: RequestContext,
        category: &Category,
    ) -> Result<Category, ApiError> {
        let id = category.id.ok_or_else(|| {
            ApiError::InvalidRequest("Cannot update a category without an id".to_string())
        })?;
        self.put(ctx, &format!("{CATEGORIES_PATH}/{id}"), category)
            .await
    }

    #[instrument(skip(self, category), fields(category_code = ?category.code()))]
    async fn create_category(
        &self,
        ctx: RequestContext,
        category: &Category,
    ) -> Result<Category, ApiError> {
        self.post(ctx, &format!("{CATEGORIES_PATH}/"), category).await
    }

    #[instrument(skip(self))]
    async fn products_after(
        &self,
        ctx: RequestContext,
        after: Option<i64>,
        page_size: u32,
    ) -> Result<Page<Product>, ApiError> {
        self.get(ctx, PRODUCTS_PATH, &products_query(after, page_size))
            .await
    }

    #[instrument(skip(self, product), fields(product_code = %product.product_code))]
    async fn save_product(&self, ctx: RequestContext, product: &Product) -> Result<(), ApiError> {
        let path = format!(
            "{PRODUCTS_PATH}/{}",
            urlencoding::encode(&product.product_code)
        );
        let _: Value = self.put(ctx, &path, product).await?;
        Ok(())
    }
}

#[async_trait]
impl ResourceApi for AdminClient {
    #[instrument(skip(self))]
    async fn get_json(&self, ctx: RequestContext, path: &str) -> Result<Value, ApiError> {
        self.get(ctx, path, &[]).await
    }

    #[instrument(skip(self, body))]
    async fn put_json(
        &self,
        ctx: RequestContext,
        path: &str,
        body: &Value,
    ) -> Result<Value, ApiError> {
        self.put(ctx, path, body).await
    }

    #[instrument(skip(self, body))]
    async fn post_json(
        &self,
        ctx: RequestContext,
        path: &str,
        body: &Value,
    ) -> Result<Value, ApiError> {
        self.post(ctx, path, body).await
    }
}
