//! Handlers for export jobs and the restores created from them.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use stockpile_core::types::DbId;
use stockpile_db::models::export::CreateExport;
use stockpile_db::models::restore_operation::CreateRestoreOperation;

use crate::error::AppResult;
use crate::middleware::actor::RequestActor;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/exports
pub async fn list_exports(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let exports = state.backup.list_exports().await?;
    Ok(Json(DataResponse { data: exports }))
}

/// POST /api/v1/exports
///
/// Create an export and queue it. Returns the pending record; poll
/// `GET /exports/{id}` for progress.
pub async fn create_export(
    RequestActor(actor): RequestActor,
    State(state): State<AppState>,
    Json(input): Json<CreateExport>,
) -> AppResult<impl IntoResponse> {
    let export = state.backup.create_export(&actor, &input).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: export })))
}

/// GET /api/v1/exports/{id}
pub async fn get_export(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let export = state.backup.get_export(id).await?;
    Ok(Json(DataResponse { data: export }))
}

/// DELETE /api/v1/exports/{id}
///
/// Remove the export, its document, and its restore history. Rejected
/// while the export or one of its restores is active.
pub async fn delete_export(
    RequestActor(actor): RequestActor,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    state.backup.delete_export(id).await?;
    tracing::info!(export_id = id, user_id = %actor.user_id, "Export deleted via API");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/exports/{id}/restores
pub async fn list_export_restores(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let restores = state.backup.list_restores_by_export(id).await?;
    Ok(Json(DataResponse { data: restores }))
}

/// POST /api/v1/exports/{id}/restores
///
/// Restore from this export. Any `export_id` in the body is replaced by the
/// one in the path.
pub async fn create_export_restore(
    RequestActor(actor): RequestActor,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(mut input): Json<CreateRestoreOperation>,
) -> AppResult<impl IntoResponse> {
    input.export_id = Some(id);
    let op = state.backup.create_restore(&actor, &input).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: op })))
}

/// GET /api/v1/exports/{id}/steps
///
/// Steps of every restore made from this export, oldest first.
pub async fn list_export_steps(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let steps = state.backup.list_export_restore_steps(id).await?;
    Ok(Json(DataResponse { data: steps }))
}
