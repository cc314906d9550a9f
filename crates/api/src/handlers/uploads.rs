//! Upload side channel for restoring documents that did not come from an
//! export on this installation.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::error::AppResult;
use crate::middleware::actor::RequestActor;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    /// Bucket key to pass as `source_file_path` when creating a restore.
    pub source_file_path: String,
    pub size: usize,
}

/// POST /api/v1/uploads
///
/// Store the raw request body (an XML backup document) and return its key.
/// The document is only parsed when a restore runs.
pub async fn upload(
    RequestActor(actor): RequestActor,
    State(state): State<AppState>,
    body: Bytes,
) -> AppResult<impl IntoResponse> {
    let key = state.backup.upload_source(&body).await?;
    tracing::info!(%key, user_id = %actor.user_id, "Backup document uploaded via API");
    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: UploadResponse {
                source_file_path: key,
                size: body.len(),
            },
        }),
    ))
}
