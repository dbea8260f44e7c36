use std::sync::Arc;

use embedgate_application::{
    AdminPolicy, IdentityProvider, MappingAdminService, ReportAccessStore, ReportService,
    RoleMappingStore, RoleResolver, TokenNegotiator,
};
use embedgate_core::AppError;
use embedgate_infrastructure::{
    EMBEDDING_API_SCOPE, EntraIdentityConfig, EntraIdentityProvider, PowerBiClient,
    PowerBiClientConfig, ServicePrincipalConfig, ServicePrincipalTokenProvider,
};

use crate::api_config::ApiConfig;
use crate::state::AppState;

/// Storage adapters backing both mapping collections.
pub struct MappingStores {
    pub role_store: Arc<dyn RoleMappingStore>,
    pub report_access_store: Arc<dyn ReportAccessStore>,
    pub backend: &'static str,
}

pub fn build_app_state(config: &ApiConfig, stores: MappingStores) -> Result<AppState, AppError> {
    let http_client = reqwest::Client::builder()
        .build()
        .map_err(|error| AppError::Internal(format!("failed to build HTTP client: {error}")))?;

    let token_provider = Arc::new(ServicePrincipalTokenProvider::new(
        http_client.clone(),
        ServicePrincipalConfig {
            authority_host: config.authority_host.clone(),
            tenant_id: config.tenant_id.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            scope: EMBEDDING_API_SCOPE.to_owned(),
            request_timeout: config.embed_request_timeout,
        },
    ));
    let power_bi_client = Arc::new(PowerBiClient::new(
        http_client.clone(),
        token_provider,
        PowerBiClientConfig {
            api_base_url: config.embed_api_base_url.clone(),
            workspace_id: config.workspace_id.clone(),
            request_timeout: config.embed_request_timeout,
        },
    ));
    let identity_provider: Arc<dyn IdentityProvider> = Arc::new(EntraIdentityProvider::new(
        http_client,
        EntraIdentityConfig {
            authority_host: config.authority_host.clone(),
            tenant_id: config.tenant_id.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
            graph_base_url: config.graph_base_url.clone(),
            request_timeout: config.embed_request_timeout,
        },
    ));

    let admin_policy = AdminPolicy::from_comma_separated(&config.admin_emails);
    let role_resolver = RoleResolver::new(stores.role_store.clone());

    Ok(AppState {
        token_negotiator: TokenNegotiator::new(power_bi_client.clone(), role_resolver),
        report_service: ReportService::new(
            admin_policy.clone(),
            power_bi_client,
            stores.report_access_store.clone(),
        ),
        mapping_admin_service: MappingAdminService::new(
            admin_policy,
            stores.role_store,
            stores.report_access_store,
        ),
        identity_provider,
        frontend_url: config.frontend_url.clone(),
        storage_backend: stores.backend,
    })
}
