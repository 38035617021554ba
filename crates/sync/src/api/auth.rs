//! Application authentication.
//!
//! Exchanges the application's client id/secret for a short-lived bearer
//! token and caches it until shortly before it expires.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, instrument};

use super::ApiError;

/// Path of the OAuth ticket endpoint, relative to the API root.
const AUTH_PATH: &str = "platform/applications/authtickets/oauth";

/// Seconds subtracted from the expiry so a token is never sent at its edge.
const EXPIRY_SKEW_SECS: i64 = 30;

/// Bearer token obtained from the credential exchange.
#[derive(Debug, Clone)]
pub struct Credential {
    /// Access token for API requests.
    pub token: SecretString,
    /// Unix timestamp when the token expires.
    pub expires_at: i64,
}

impl Credential {
    /// Whether the token may still be sent.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        chrono::Utc::now().timestamp() < self.expires_at - EXPIRY_SKEW_SECS
    }
}

/// Something that can trade application credentials for a token.
#[async_trait]
pub trait CredentialExchange: Send + Sync {
    /// Perform one exchange.
    async fn exchange(&self) -> Result<Credential, ApiError>;
}

#[derive(Serialize)]
struct AuthRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
}

#[derive(Deserialize)]
struct AuthResponse {
    access_token: String,
    /// Token lifetime in seconds.
    expires_in: i64,
}

/// Client-credentials exchange against the platform's OAuth endpoint.
pub struct OAuthExchange {
    client: reqwest::Client,
    endpoint: String,
    client_id: String,
    client_secret: SecretString,
}

impl OAuthExchange {
    /// Create an exchange for the given API root.
    #[must_use]
    pub fn new(
        client: reqwest::Client,
        api_root: &str,
        client_id: impl Into<String>,
        client_secret: SecretString,
    ) -> Self {
        Self {
            client,
            endpoint: format!("{}/{AUTH_PATH}", api_root.trim_end_matches('/')),
            client_id: client_id.into(),
            client_secret,
        }
    }
}

#[async_trait]
impl CredentialExchange for OAuthExchange {
    #[instrument(skip(self), fields(client_id = %self.client_id))]
    async fn exchange(&self) -> Result<Credential, ApiError> {
        let now = chrono::Utc::now().timestamp();

        let response = self
            .client
            .post(&self.endpoint)
            .json(&AuthRequest {
                client_id: &self.client_id,
                client_secret: self.client_secret.expose_secret(),
            })
            .send()
            .await?;

        let status = response.status();

        if status.is_success() {
            let auth: AuthResponse = response.json().await?;
            Ok(Credential {
                token: SecretString::from(auth.access_token),
                expires_at: now + auth.expires_in,
            })
        } else {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());

            Err(ApiError::AuthenticationFailed(format!(
                "HTTP {status}: {error_text}"
            )))
        }
    }
}

/// Caches the current credential and refreshes it on demand.
///
/// Readers take the read lock; only a caller that finds the cache empty or
/// stale takes the refresh mutex, and it re-checks the cache once it holds
/// it, so concurrent callers share a single exchange.
pub struct SessionCache<X> {
    exchange: X,
    credential: RwLock<Option<Credential>>,
    refresh: Mutex<()>,
}

impl<X: CredentialExchange> SessionCache<X> {
    /// Create an empty cache.
    #[must_use]
    pub fn new(exchange: X) -> Self {
        Self {
            exchange,
            credential: RwLock::new(None),
            refresh: Mutex::new(()),
        }
    }

    /// A token that is valid right now.
    ///
    /// # Errors
    ///
    /// Returns the exchange's error when a refresh was needed and failed.
    /// Nothing is cached in that case.
    pub async fn token(&self) -> Result<SecretString, ApiError> {
        if let Some(token) = self.cached().await {
            return Ok(token);
        }

        let _guard = self.refresh.lock().await;
        if let Some(token) = self.cached().await {
            return Ok(token);
        }

        debug!("Refreshing access token");
        let credential = self.exchange.exchange().await?;
        let token = credential.token.clone();
        *self.credential.write().await = Some(credential);
        Ok(token)
    }

    /// Drop the cached credential so the next call re-authenticates.
    pub async fn invalidate(&self) {
        *self.credential.write().await = None;
    }

    async fn cached(&self) -> Option<SecretString> {
        self.credential
            .read()
            .await
            .as_ref()
            .filter(|credential| credential.is_valid())
            .map(|credential| credential.token.clone())
    }
}
