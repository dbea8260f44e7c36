use std::sync::Arc;

use embedgate_application::{
    IdentityProvider, MappingAdminService, ReportService, TokenNegotiator,
};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub token_negotiator: TokenNegotiator,
    pub report_service: ReportService,
    pub mapping_admin_service: MappingAdminService,
    pub identity_provider: Arc<dyn IdentityProvider>,
    pub frontend_url: String,
    pub storage_backend: &'static str,
}
