//! Embedgate API composition root.

#![forbid(unsafe_code)]

mod api_config;
mod api_router;
mod api_services;
mod auth;
mod dto;
mod error;
mod handlers;
mod middleware;
mod state;

use std::sync::Arc;

use axum::Router;
use embedgate_core::AppError;
use embedgate_infrastructure::{JsonFileMappingStore, PostgresMappingStore};
use tracing::info;

use crate::api_config::{ApiConfig, StorageConfig, init_tracing};
use crate::api_router::build_router;
use crate::api_services::{
    MappingStores, build_app_state, build_memory_session_layer, build_postgres_session_layer,
    connect_and_migrate,
};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ApiConfig::load()?;

    let app = match &config.storage {
        StorageConfig::Postgres { database_url } => {
            let pool = connect_and_migrate(database_url).await?;
            if config.migrate_only {
                info!("database migrations applied successfully");
                return Ok(());
            }

            let store = Arc::new(PostgresMappingStore::new(pool.clone()));
            let app_state = build_app_state(
                &config,
                MappingStores {
                    role_store: store.clone(),
                    report_access_store: store,
                    backend: "postgres",
                },
            )?;
            let session_layer = build_postgres_session_layer(pool, config.cookie_secure).await?;
            build_router(app_state, session_layer)?
        }
        StorageConfig::JsonFiles { directory } => {
            info!(directory = %directory.display(), "using JSON mapping files");
            let store = Arc::new(JsonFileMappingStore::new(directory));
            let app_state = build_app_state(
                &config,
                MappingStores {
                    role_store: store.clone(),
                    report_access_store: store,
                    backend: "json",
                },
            )?;
            build_router(app_state, build_memory_session_layer(config.cookie_secure))?
        }
    };

    serve(&config, app).await
}

async fn serve(config: &ApiConfig, app: Router) -> Result<(), AppError> {
    let address = config.socket_address()?;
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .map_err(|error| AppError::Internal(format!("failed to bind listener: {error}")))?;

    info!(%address, "embedgate-api listening");

    axum::serve(listener, app)
        .await
        .map_err(|error| AppError::Internal(format!("api server error: {error}")))
}
