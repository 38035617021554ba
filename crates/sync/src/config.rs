//! Configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `API_URL` - Tenant API root (e.g., `https://t12345.sandbox.example.com/api`)
//! - `CLIENT_ID` - Application client id
//! - `CLIENT_SECRET` - Application client secret
//!
//! ## Required by the product sync
//! - `MASTER_CATALOG` - Master catalog id the products live in
//! - `PRIME_CATALOG` - Catalog holding the reference categories and images
//!
//! ## Optional
//! - `TENANT_ID` - Tenant id (default: parsed from the `t<digits>` host label of `API_URL`)
//! - `CATALOG_PAIRS` - JSON `[{"source":1,"destination":2}]` (default: `[]`)
//! - `SITE_PAIRS` - JSON `[{"source":100,"destination":200}]` (default: `[]`)
//! - `HTTP_PROXY` - Proxy for all API requests
//! - `HTTP_TIMEOUT_SECS` - Per-request timeout (default: 30)
//! - `SYNC_CONCURRENCY` - Maximum concurrent product writes (default: 4)
//! - `PAGE_SIZE` - Page size for collection walks (default: 200)
//! - `CATEGORY_CODE_PREFIXES` - Comma-separated prefixes stripped by category cleanup
//!   (default: `KW-EN-,KW-AR-`)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Sentry error sample rate (default: 1.0)
//! - `LOG_FORMAT` - `json` for structured logs, anything else for text

use std::collections::HashMap;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tenant_clone_core::{CatalogId, CatalogPair, MasterCatalogId, SitePair, TenantId};
use thiserror::Error;
use tracing::warn;

use crate::orchestrator::ProductSyncSettings;

const DEFAULT_TIMEOUT_SECS: &str = "30";
const DEFAULT_CONCURRENCY: &str = "4";
const DEFAULT_PAGE_SIZE: &str = "200";
const DEFAULT_CATEGORY_CODE_PREFIXES: &str = "KW-EN-,KW-AR-";
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "xxx",
    "todo",
    "insert",
    "put-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Connection settings for the admin API.
///
/// Implements `Debug` manually to redact the client secret.
#[derive(Clone)]
pub struct ApiConfig {
    /// API root without trailing slash
    pub api_root: String,
    /// Tenant the API root belongs to
    pub tenant_id: TenantId,
    /// Application client id
    pub client_id: String,
    /// Application client secret
    pub client_secret: SecretString,
    /// Proxy URL for all requests
    pub proxy: Option<String>,
    /// Per-request timeout
    pub timeout: Duration,
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("api_root", &self.api_root)
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("proxy", &self.proxy)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Everything a run of the tool needs.
#[derive(Debug, Clone)]
pub struct CloneConfig {
    /// Admin API connection
    pub api: ApiConfig,
    /// Master catalog the product walk is scoped to
    pub master_catalog: Option<MasterCatalogId>,
    /// Catalog whose categories and images are the reference
    pub prime_catalog: Option<CatalogId>,
    /// Catalog source → destination pairs
    pub catalog_pairs: Vec<CatalogPair>,
    /// Site source → destination pairs
    pub site_pairs: Vec<SitePair>,
    /// Maximum concurrent product writes
    pub concurrency: usize,
    /// Page size for collection walks
    pub page_size: u32,
    /// Prefixes stripped from category codes by the cleanup job
    pub category_code_prefixes: Vec<String>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "sandbox", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Emit JSON logs instead of text
    pub json_logs: bool,
}

impl CloneConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let api_root = env.required("API_URL")?.trim_end_matches('/').to_string();
        let tenant_id = match env.optional("TENANT_ID") {
            Some(value) => parse_var("TENANT_ID", &value)?,
            None => tenant_id_from_api_root(&api_root)?,
        };
        let client_id = env.required("CLIENT_ID")?;
        let client_secret = SecretString::from(env.required("CLIENT_SECRET")?);
        if let Err(e) = validate_secret_strength(client_secret.expose_secret(), "CLIENT_SECRET")
        {
            // Issued by the platform, not chosen by the operator
            warn!(error = %e, "Client secret looks weak");
        }
        let timeout_secs: u64 = env.parsed_or("HTTP_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?;

        let api = ApiConfig {
            api_root,
            tenant_id,
            client_id,
            client_secret,
            proxy: env.optional("HTTP_PROXY"),
            timeout: Duration::from_secs(timeout_secs),
        };

        let master_catalog = env
            .optional("MASTER_CATALOG")
            .map(|value| parse_var("MASTER_CATALOG", &value))
            .transpose()?;
        let prime_catalog = env
            .optional("PRIME_CATALOG")
            .map(|value| parse_var("PRIME_CATALOG", &value))
            .transpose()?;
        let catalog_pairs = env.json_or_empty("CATALOG_PAIRS")?;
        let site_pairs = env.json_or_empty("SITE_PAIRS")?;

        let concurrency: usize = env.parsed_or("SYNC_CONCURRENCY", DEFAULT_CONCURRENCY)?;
        if concurrency == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "SYNC_CONCURRENCY".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        let page_size: u32 = env.parsed_or("PAGE_SIZE", DEFAULT_PAGE_SIZE)?;
        if page_size == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "PAGE_SIZE".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        let category_code_prefixes = env
            .or_default("CATEGORY_CODE_PREFIXES", DEFAULT_CATEGORY_CODE_PREFIXES)
            .split(',')
            .map(str::trim)
            .filter(|prefix| !prefix.is_empty())
            .map(ToString::to_string)
            .collect();

        let sentry_sample_rate = env
            .optional("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);

        Ok(Self {
            api,
            master_catalog,
            prime_catalog,
            catalog_pairs,
            site_pairs,
            concurrency,
            page_size,
            category_code_prefixes,
            sentry_dsn: env.optional("SENTRY_DSN"),
            sentry_environment: env.optional("SENTRY_ENVIRONMENT"),
            sentry_sample_rate,
            json_logs: env
                .optional("LOG_FORMAT")
                .is_some_and(|format| format.eq_ignore_ascii_case("json")),
        })
    }

    /// Settings for the product sync.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if `MASTER_CATALOG` or
    /// `PRIME_CATALOG` is not set.
    pub fn product_sync_settings(&self) -> Result<ProductSyncSettings, ConfigError> {
        let master_catalog = self
            .master_catalog
            .ok_or_else(|| ConfigError::MissingEnvVar("MASTER_CATALOG".to_string()))?;
        let prime_catalog = self
            .prime_catalog
            .ok_or_else(|| ConfigError::MissingEnvVar("PRIME_CATALOG".to_string()))?;

        Ok(ProductSyncSettings {
            master_catalog,
            prime_catalog,
            catalog_pairs: self.catalog_pairs.clone(),
            page_size: self.page_size,
            concurrency: self.concurrency,
        })
    }
}

// =============================================================================
// Helper functions
// =============================================================================

/// Variable source wrapper.
struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
    /// Get an optional variable. Empty values count as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|value| !value.trim().is_empty())
    }

    /// Get a required variable.
    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    /// Get a variable with a default value.
    fn or_default(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    /// Parse a variable, falling back to a default.
    fn parsed_or<T>(&self, key: &str, default: &str) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        parse_var(key, &self.or_default(key, default))
    }

    /// Parse a JSON variable, `[]` when unset.
    fn json_or_empty<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>, ConfigError> {
        self.optional(key).map_or_else(
            || Ok(Vec::new()),
            |value| {
                serde_json::from_str(&value)
                    .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
            },
        )
    }
}

fn parse_var<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Tenant id from the `t<digits>` label that leads the API host name.
fn tenant_id_from_api_root(api_root: &str) -> Result<TenantId, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidEnvVar("API_URL".to_string(), reason.to_string());

    let url = url::Url::parse(api_root).map_err(|e| invalid(&e.to_string()))?;
    let host = url.host_str().ok_or_else(|| invalid("missing host"))?;
    host.split('.')
        .next()
        .and_then(|label| label.strip_prefix('t'))
        .and_then(|digits| digits.parse::<i32>().ok())
        .map(TenantId::new)
        .ok_or_else(|| invalid("host does not start with t<tenant id>; set TENANT_ID"))
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Check that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!("entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1})"),
        ));
    }

    Ok(())
}
