//! Authorization-code sign-in against the directory identity provider.

use std::time::Duration;

use async_trait::async_trait;
use embedgate_application::IdentityProvider;
use embedgate_core::{AppError, AppResult, UserIdentity};
use serde::Deserialize;
use url::Url;

const SIGN_IN_SCOPE: &str = "User.Read";

/// Settings for the interactive sign-in flow.
#[derive(Debug, Clone)]
pub struct EntraIdentityConfig {
    /// Authority base URL, e.g. `https://login.microsoftonline.com`.
    pub authority_host: String,
    /// Directory tenant id.
    pub tenant_id: String,
    /// Application (client) id.
    pub client_id: String,
    /// Client secret.
    pub client_secret: String,
    /// Callback URL registered for the application.
    pub redirect_uri: String,
    /// Profile API base URL, e.g. `https://graph.microsoft.com/v1.0`.
    pub graph_base_url: String,
    /// Upper bound for each outbound call.
    pub request_timeout: Duration,
}

impl EntraIdentityConfig {
    fn endpoint(&self, name: &str) -> String {
        format!(
            "{}/{}/oauth2/v2.0/{name}",
            self.authority_host.trim_end_matches('/'),
            self.tenant_id
        )
    }
}

#[derive(Debug, Deserialize)]
struct CodeExchangeResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileResponse {
    #[serde(default)]
    user_principal_name: Option<String>,
    #[serde(default)]
    mail: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
}

/// Identity provider adapter for the directory's OAuth endpoints.
pub struct EntraIdentityProvider {
    http_client: reqwest::Client,
    config: EntraIdentityConfig,
}

impl EntraIdentityProvider {
    /// Creates a new identity provider adapter.
    #[must_use]
    pub fn new(http_client: reqwest::Client, config: EntraIdentityConfig) -> Self {
        Self {
            http_client,
            config,
        }
    }

    async fn fetch_profile(&self, access_token: &str) -> AppResult<UserIdentity> {
        let response = self
            .http_client
            .get(format!(
                "{}/me",
                self.config.graph_base_url.trim_end_matches('/')
            ))
            .bearer_auth(access_token)
            .timeout(self.config.request_timeout)
            .send()
            .await
            .map_err(|error| AppError::Upstream(format!("profile request failed: {error}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!(
                "profile request failed with status {status}: {body}"
            )));
        }

        let profile = response.json::<ProfileResponse>().await.map_err(|error| {
            AppError::Upstream(format!("failed to decode profile response: {error}"))
        })?;

        let email = profile
            .user_principal_name
            .or(profile.mail)
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| {
                AppError::Unauthorized("signed-in account has no email address".to_owned())
            })?;
        let display_name = profile
            .display_name
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| email.clone());

        Ok(UserIdentity::new(email, display_name))
    }
}

#[async_trait]
impl IdentityProvider for EntraIdentityProvider {
    fn authorization_url(&self, state: &str) -> AppResult<String> {
        let mut url = Url::parse(&self.config.endpoint("authorize")).map_err(|error| {
            AppError::Internal(format!("invalid authority URL: {error}"))
        })?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("response_mode", "query")
            .append_pair("scope", SIGN_IN_SCOPE)
            .append_pair("state", state);

        Ok(url.into())
    }

    async fn exchange_code(&self, code: &str) -> AppResult<UserIdentity> {
        if code.trim().is_empty() {
            return Err(AppError::Validation(
                "authorization code must not be empty".to_owned(),
            ));
        }

        let response = self
            .http_client
            .post(self.config.endpoint("token"))
            .timeout(self.config.request_timeout)
            .form(&[
                ("grant_type", "authorization_code"),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("code", code),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("scope", SIGN_IN_SCOPE),
            ])
            .send()
            .await
            .map_err(|error| AppError::Upstream(format!("code exchange failed: {error}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Unauthorized(format!(
                "code exchange rejected with status {status}: {body}"
            )));
        }

        let exchanged = response
            .json::<CodeExchangeResponse>()
            .await
            .map_err(|error| {
                AppError::Upstream(format!("failed to decode code exchange response: {error}"))
            })?;

        self.fetch_profile(&exchanged.access_token).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use embedgate_application::IdentityProvider;
    use embedgate_core::AppError;
    use url::Url;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::{EntraIdentityConfig, EntraIdentityProvider};

    fn provider(server_uri: &str) -> EntraIdentityProvider {
        provider_with_timeout(server_uri, Duration::from_secs(5))
    }

    fn provider_with_timeout(server_uri: &str, request_timeout: Duration) -> EntraIdentityProvider {
        EntraIdentityProvider::new(
            reqwest::Client::new(),
            EntraIdentityConfig {
                authority_host: server_uri.to_owned(),
                tenant_id: "tenant-1".to_owned(),
                client_id: "client-1".to_owned(),
                client_secret: "secret".to_owned(),
                redirect_uri: "http://localhost:5000/auth/callback".to_owned(),
                graph_base_url: format!("{server_uri}/graph/v1.0"),
                request_timeout,
            },
        )
    }

    #[test]
    fn authorization_url_carries_state_and_redirect() {
        let provider = provider("https://login.example.com");

        let Ok(raw) = provider.authorization_url("state-123") else {
            panic!("authorization url failed");
        };
        let Ok(url) = Url::parse(&raw) else {
            panic!("invalid url: {raw}");
        };

        assert_eq!(url.path(), "/tenant-1/oauth2/v2.0/authorize");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("state".to_owned(), "state-123".to_owned())));
        assert!(pairs.contains(&("scope".to_owned(), "User.Read".to_owned())));
        assert!(pairs.contains(&(
            "redirect_uri".to_owned(),
            "http://localhost:5000/auth/callback".to_owned()
        )));
    }

    #[tokio::test]
    async fn code_exchange_resolves_profile() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tenant-1/oauth2/v2.0/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "user-token",
                "token_type": "Bearer"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/graph/v1.0/me"))
            .and(header("authorization", "Bearer user-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "userPrincipalName": "Jane@Co.com",
                "displayName": "Jane Doe"
            })))
            .mount(&server)
            .await;

        let identity = provider(&server.uri()).exchange_code("abc").await;

        let Ok(identity) = identity else {
            panic!("code exchange failed");
        };
        assert_eq!(identity.email(), "Jane@Co.com");
        assert_eq!(identity.display_name(), "Jane Doe");
    }

    #[tokio::test]
    async fn rejected_code_is_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tenant-1/oauth2/v2.0/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant"
            })))
            .mount(&server)
            .await;

        let result = provider(&server.uri()).exchange_code("expired").await;

        assert!(matches!(result, Err(AppError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn slow_profile_lookup_is_cut_off() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tenant-1/oauth2/v2.0/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "user-token"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/graph/v1.0/me"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"userPrincipalName": "jane@co.com"}))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let provider = provider_with_timeout(&server.uri(), Duration::from_millis(200));
        let started = Instant::now();
        let result = provider.exchange_code("abc").await;

        assert!(matches!(result, Err(AppError::Upstream(_))));
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
