use async_trait::async_trait;
use embedgate_core::{AppResult, UserIdentity};

/// Port for the external identity provider's authorization-code flow.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Builds the provider URL the browser is redirected to for sign-in.
    fn authorization_url(&self, state: &str) -> AppResult<String>;

    /// Exchanges an authorization code for the signed-in user's identity.
    async fn exchange_code(&self, code: &str) -> AppResult<UserIdentity>;
}
