use axum::Router;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, Method};
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, post};
use embedgate_core::AppError;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tower_sessions::{SessionManagerLayer, SessionStore};

use crate::state::AppState;
use crate::{auth, handlers, middleware};

pub fn build_router<Store>(
    app_state: AppState,
    session_layer: SessionManagerLayer<Store>,
) -> Result<Router, AppError>
where
    Store: SessionStore + Clone,
{
    let protected_routes = Router::new()
        .route("/auth/me", get(auth::me_handler))
        .route("/api/my-reports", get(handlers::reports::my_reports_handler))
        .route(
            "/api/reports/{report_id}/embed",
            get(handlers::reports::embed_report_handler),
        )
        .route(
            "/api/admin/reports",
            get(handlers::admin::list_reports_handler),
        )
        .route(
            "/api/admin/datasets/{dataset_id}/roles",
            get(handlers::admin::dataset_roles_handler),
        )
        .route(
            "/api/admin/role-mappings",
            get(handlers::admin::list_role_mappings_handler)
                .put(handlers::admin::save_role_mapping_handler),
        )
        .route(
            "/api/admin/role-mappings/delete",
            post(handlers::admin::delete_role_mapping_handler),
        )
        .route(
            "/api/admin/report-access",
            get(handlers::admin::list_report_access_handler)
                .put(handlers::admin::save_report_access_handler),
        )
        .route(
            "/api/admin/report-access/delete",
            post(handlers::admin::delete_report_access_handler),
        )
        .route_layer(from_fn(middleware::require_auth));

    let cors_layer = CorsLayer::new()
        .allow_origin(
            HeaderValue::from_str(&app_state.frontend_url)
                .map_err(|error| AppError::Internal(format!("invalid FRONTEND_URL: {error}")))?,
        )
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE]);

    Ok(Router::new()
        .route("/health", get(handlers::health::health_handler))
        .route("/auth/login", get(auth::login_handler))
        .route("/auth/callback", get(auth::callback_handler))
        .route("/auth/logout", post(auth::logout_handler))
        .merge(protected_routes)
        .route_layer(from_fn_with_state(
            app_state.clone(),
            middleware::require_same_origin_for_mutations,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .layer(session_layer)
        .with_state(app_state))
}
