//! Session sign-in through the directory identity provider.

use axum::Json;
use axum::extract::{Extension, Query, State};
use axum::http::StatusCode;
use axum::response::Redirect;
use embedgate_core::{AppError, UserIdentity};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{info, warn};
use uuid::Uuid;

use crate::dto::UserIdentityResponse;
use crate::error::ApiResult;
use crate::state::AppState;

pub const SESSION_USER_KEY: &str = "user_identity";
const SESSION_OAUTH_STATE_KEY: &str = "oauth_state";

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

pub async fn login_handler(
    State(state): State<AppState>,
    session: Session,
) -> ApiResult<Redirect> {
    let oauth_state = Uuid::new_v4().to_string();
    session
        .insert(SESSION_OAUTH_STATE_KEY, oauth_state.as_str())
        .await
        .map_err(|error| AppError::Internal(format!("failed to store login state: {error}")))?;

    let authorization_url = state.identity_provider.authorization_url(&oauth_state)?;
    Ok(Redirect::to(&authorization_url))
}

pub async fn callback_handler(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<CallbackQuery>,
) -> ApiResult<Redirect> {
    let expected_state = session
        .remove::<String>(SESSION_OAUTH_STATE_KEY)
        .await
        .map_err(|error| AppError::Internal(format!("failed to read login state: {error}")))?;

    if let Some(error) = query.error {
        warn!(
            %error,
            description = query.error_description.as_deref().unwrap_or_default(),
            "identity provider rejected sign-in"
        );
        return Err(AppError::Unauthorized(format!("sign-in failed: {error}")).into());
    }

    match (expected_state, query.state) {
        (Some(expected), Some(received)) if expected == received => {}
        _ => {
            return Err(AppError::Unauthorized("sign-in state mismatch".to_owned()).into());
        }
    }

    let code = query
        .code
        .ok_or_else(|| AppError::Validation("authorization code is required".to_owned()))?;
    let identity = state.identity_provider.exchange_code(&code).await?;

    session
        .cycle_id()
        .await
        .map_err(|error| AppError::Internal(format!("failed to rotate session: {error}")))?;
    session
        .insert(SESSION_USER_KEY, &identity)
        .await
        .map_err(|error| AppError::Internal(format!("failed to persist session: {error}")))?;

    info!(email = identity.email(), "user signed in");
    Ok(Redirect::to(&state.frontend_url))
}

pub async fn logout_handler(session: Session) -> ApiResult<StatusCode> {
    session
        .delete()
        .await
        .map_err(|error| AppError::Internal(format!("failed to delete session: {error}")))?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn me_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
) -> Json<UserIdentityResponse> {
    let is_admin = state.report_service.is_admin(&user);
    Json(UserIdentityResponse::from_identity(&user, is_admin))
}
