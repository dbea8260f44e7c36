//! Client-credentials access tokens for the embedding REST API.

use std::time::{Duration, Instant};

use embedgate_application::GatewayFailure;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;

/// Tokens are refreshed this long before the authority says they expire.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Scope granting access to the embedding REST API.
pub const EMBEDDING_API_SCOPE: &str = "https://analysis.windows.net/powerbi/api/.default";

/// Service principal credentials.
#[derive(Debug, Clone)]
pub struct ServicePrincipalConfig {
    /// Authority base URL, e.g. `https://login.microsoftonline.com`.
    pub authority_host: String,
    /// Directory tenant id.
    pub tenant_id: String,
    /// Application (client) id.
    pub client_id: String,
    /// Client secret.
    pub client_secret: String,
    /// Requested scope.
    pub scope: String,
    /// Upper bound for one token request.
    pub request_timeout: Duration,
}

impl ServicePrincipalConfig {
    fn token_endpoint(&self) -> String {
        format!(
            "{}/{}/oauth2/v2.0/token",
            self.authority_host.trim_end_matches('/'),
            self.tenant_id
        )
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    refresh_after: Instant,
}

/// Acquires and caches service principal access tokens.
pub struct ServicePrincipalTokenProvider {
    http_client: reqwest::Client,
    config: ServicePrincipalConfig,
    cached: Mutex<Option<CachedToken>>,
}

impl ServicePrincipalTokenProvider {
    /// Creates a provider. No token is requested until first use.
    #[must_use]
    pub fn new(http_client: reqwest::Client, config: ServicePrincipalConfig) -> Self {
        Self {
            http_client,
            config,
            cached: Mutex::new(None),
        }
    }

    /// Returns a valid access token, requesting a new one when the cached
    /// token is missing or close to expiry.
    ///
    /// The request is bounded by `request_timeout`; an elapsed request is
    /// reported as [`GatewayFailure::Timeout`].
    pub async fn access_token(&self) -> Result<String, GatewayFailure> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_after {
                return Ok(token.value.clone());
            }
        }

        let token = self.request_token().await?;
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }

    async fn request_token(&self) -> Result<CachedToken, GatewayFailure> {
        let response = self
            .http_client
            .post(self.config.token_endpoint())
            .timeout(self.config.request_timeout)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("scope", self.config.scope.as_str()),
            ])
            .send()
            .await
            .map_err(|error| transport_failure(&error, "failed to reach token endpoint"))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| transport_failure(&error, "failed to read token response"))?;

        if !status.is_success() {
            let detail = serde_json::from_str::<TokenErrorResponse>(&body)
                .ok()
                .and_then(|error| error.error_description.or(error.error))
                .unwrap_or(body);
            return Err(GatewayFailure::Authentication(format!(
                "failed to acquire service token (status {status}): {detail}"
            )));
        }

        let token = serde_json::from_str::<TokenResponse>(&body).map_err(|error| {
            GatewayFailure::Authentication(format!("failed to decode token response: {error}"))
        })?;

        let lifetime = Duration::from_secs(token.expires_in.unwrap_or(3600));
        debug!(lifetime_seconds = lifetime.as_secs(), "acquired service token");

        Ok(CachedToken {
            value: token.access_token,
            refresh_after: Instant::now() + lifetime.saturating_sub(REFRESH_MARGIN),
        })
    }
}

fn transport_failure(error: &reqwest::Error, context: &str) -> GatewayFailure {
    if error.is_timeout() {
        GatewayFailure::Timeout
    } else {
        GatewayFailure::Authentication(format!("{context}: {error}"))
    }
}
