use axum::Json;
use axum::extract::{Extension, Path, State};
use chrono::Utc;
use embedgate_application::{EmbedTokenError, NegotiationAttempt};
use embedgate_core::{AppError, UserIdentity};
use tracing::{error, info};

use crate::dto::{EmbedTokenResponse, ReportResponse};
use crate::error::{ApiResult, REPORT_UNAVAILABLE_MESSAGE};
use crate::state::AppState;

pub async fn my_reports_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
) -> ApiResult<Json<Vec<ReportResponse>>> {
    let reports = state
        .report_service
        .list_my_reports(&user)
        .await?
        .into_iter()
        .map(ReportResponse::from)
        .collect();

    Ok(Json(reports))
}

pub async fn embed_report_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(report_id): Path<String>,
) -> ApiResult<Json<EmbedTokenResponse>> {
    let report = state.report_service.open_report(&user, &report_id).await?;

    let negotiated = state
        .token_negotiator
        .negotiate(
            report.id.as_str(),
            report.dataset_id.as_str(),
            user.email(),
        )
        .await;

    match negotiated {
        Ok(result) => {
            info!(
                report_id = %report.id,
                dataset_id = %report.dataset_id,
                identity_applied = result.identity_applied,
                default_role_applied = result.default_role_applied,
                "embed token issued"
            );
            Ok(Json(EmbedTokenResponse::new(report, result, Utc::now())))
        }
        Err(negotiation_error) => {
            log_negotiation_failure(&report_id, report.dataset_id.as_str(), &negotiation_error);
            Err(AppError::Upstream(REPORT_UNAVAILABLE_MESSAGE.to_owned()).into())
        }
    }
}

fn log_negotiation_failure(report_id: &str, dataset_id: &str, failure: &EmbedTokenError) {
    let attempt = failure.attempt().map(NegotiationAttempt::as_str);
    match failure {
        EmbedTokenError::BareRejected { status, body } => error!(
            report_id,
            dataset_id,
            attempt,
            status,
            body = body.as_str(),
            "embedding service rejected token request"
        ),
        EmbedTokenError::IdentityRejected {
            status,
            body,
            roles,
            ..
        } => error!(
            report_id,
            dataset_id,
            attempt,
            status,
            roles = %roles.join(","),
            body = body.as_str(),
            "embedding service rejected identity token request"
        ),
        other => error!(
            report_id,
            dataset_id,
            attempt,
            error = %other,
            "embed token negotiation failed"
        ),
    }
}
