//! Handlers for restore operations and their step logs.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use stockpile_core::types::DbId;
use stockpile_db::models::restore_operation::CreateRestoreOperation;

use crate::error::AppResult;
use crate::middleware::actor::RequestActor;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct RunningResponse {
    pub running: bool,
}

/// GET /api/v1/restores
pub async fn list_restores(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let restores = state.backup.list_restores().await?;
    Ok(Json(DataResponse { data: restores }))
}

/// POST /api/v1/restores
///
/// Create a restore from an export (`export_id`) or an uploaded document
/// (`source_file_path`) and queue it.
pub async fn create_restore(
    RequestActor(actor): RequestActor,
    State(state): State<AppState>,
    Json(input): Json<CreateRestoreOperation>,
) -> AppResult<impl IntoResponse> {
    let op = state.backup.create_restore(&actor, &input).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: op })))
}

/// GET /api/v1/restores/running
pub async fn running(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let running = state.backup.has_running_restores().await?;
    Ok(Json(DataResponse {
        data: RunningResponse { running },
    }))
}

/// GET /api/v1/restores/{id}
///
/// The operation with its steps.
pub async fn get_restore(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let op = state.backup.get_restore(id).await?;
    Ok(Json(DataResponse { data: op }))
}

/// DELETE /api/v1/restores/{id}
pub async fn delete_restore(
    RequestActor(actor): RequestActor,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    state.backup.delete_restore(id).await?;
    tracing::info!(restore_id = id, user_id = %actor.user_id, "Restore operation deleted via API");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/restores/{id}/steps
pub async fn list_restore_steps(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let steps = state.backup.list_restore_steps(id).await?;
    Ok(Json(DataResponse { data: steps }))
}
