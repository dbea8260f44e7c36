use axum::Json;
use axum::extract::{Extension, Path, State};
use embedgate_application::{SaveReportAccessInput, SaveRoleMappingInput};
use embedgate_core::{AppError, UserIdentity};
use tracing::info;

use crate::dto::{
    DatasetRolesResponse, DeleteReportAccessRequest, DeleteResponse, DeleteRoleMappingRequest,
    ReportAccessResponse, ReportResponse, RoleMappingResponse, SaveReportAccessRequest,
    SaveRoleMappingRequest,
};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn list_reports_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
) -> ApiResult<Json<Vec<ReportResponse>>> {
    let reports = state
        .report_service
        .list_all_reports(&user)
        .await?
        .into_iter()
        .map(ReportResponse::from)
        .collect();

    Ok(Json(reports))
}

pub async fn dataset_roles_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(dataset_id): Path<String>,
) -> ApiResult<Json<DatasetRolesResponse>> {
    let roles = state.report_service.dataset_roles(&user, &dataset_id).await?;

    Ok(Json(DatasetRolesResponse { dataset_id, roles }))
}

pub async fn list_role_mappings_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
) -> ApiResult<Json<Vec<RoleMappingResponse>>> {
    let mappings = state
        .mapping_admin_service
        .list_role_mappings(&user)
        .await?
        .into_iter()
        .map(RoleMappingResponse::from)
        .collect();

    Ok(Json(mappings))
}

pub async fn save_role_mapping_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Json(payload): Json<SaveRoleMappingRequest>,
) -> ApiResult<Json<RoleMappingResponse>> {
    let mapping = state
        .mapping_admin_service
        .save_role_mapping(
            &user,
            SaveRoleMappingInput {
                user_email: payload.user_email,
                dataset_id: payload.dataset_id,
                roles: payload.roles,
            },
        )
        .await?;

    info!(
        actor = user.email(),
        user_email = mapping.user_email().as_str(),
        dataset_id = mapping.dataset_id().as_str(),
        roles = %mapping.roles().as_slice().join(","),
        "role mapping saved"
    );
    Ok(Json(RoleMappingResponse::from(mapping)))
}

pub async fn delete_role_mapping_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Json(payload): Json<DeleteRoleMappingRequest>,
) -> ApiResult<Json<DeleteResponse>> {
    let removed = state
        .mapping_admin_service
        .delete_role_mapping(&user, &payload.user_email, payload.dataset_id.as_deref())
        .await?;

    info!(
        actor = user.email(),
        user_email = payload.user_email.as_str(),
        dataset_id = payload.dataset_id.as_deref(),
        removed,
        "role mappings deleted"
    );
    delete_response(removed)
}

pub async fn list_report_access_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
) -> ApiResult<Json<Vec<ReportAccessResponse>>> {
    let mappings = state
        .mapping_admin_service
        .list_report_access(&user)
        .await?
        .into_iter()
        .map(ReportAccessResponse::from)
        .collect();

    Ok(Json(mappings))
}

pub async fn save_report_access_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Json(payload): Json<SaveReportAccessRequest>,
) -> ApiResult<Json<ReportAccessResponse>> {
    let mapping = state
        .mapping_admin_service
        .save_report_access(
            &user,
            SaveReportAccessInput {
                user_email: payload.user_email,
                report_ids: payload.report_ids,
            },
        )
        .await?;

    info!(
        actor = user.email(),
        user_email = mapping.user_email().as_str(),
        report_count = mapping.report_ids().len(),
        "report access saved"
    );
    Ok(Json(ReportAccessResponse::from(mapping)))
}

pub async fn delete_report_access_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Json(payload): Json<DeleteReportAccessRequest>,
) -> ApiResult<Json<DeleteResponse>> {
    let removed = state
        .mapping_admin_service
        .delete_report_access(&user, &payload.user_email)
        .await?;

    info!(
        actor = user.email(),
        user_email = payload.user_email.as_str(),
        removed,
        "report access deleted"
    );
    delete_response(removed)
}

fn delete_response(removed: usize) -> ApiResult<Json<DeleteResponse>> {
    let removed = u32::try_from(removed)
        .map_err(|error| AppError::Internal(format!("removed count out of range: {error}")))?;
    Ok(Json(DeleteResponse { removed }))
}
