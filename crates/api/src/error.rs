use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use stockpile_backup::bucket::BucketError;
use stockpile_backup::BackupError;
use stockpile_core::error::CoreError;
use stockpile_db::StoreError;

/// Application-level error type for HTTP handlers.
///
/// Implements [`IntoResponse`] to produce consistent `{ "error", "code" }`
/// JSON bodies.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Backup(#[from] BackupError),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Core(core) => classify_core_error(core),
            AppError::Backup(err) => classify_backup_error(err),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

fn internal(detail: &dyn std::fmt::Display) -> (StatusCode, &'static str, String) {
    tracing::error!(error = %detail, "Internal error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}

fn classify_core_error(err: &CoreError) -> (StatusCode, &'static str, String) {
    match err {
        CoreError::NotFound { entity, id } => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("{entity} with id {id} not found"),
        ),
        CoreError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
        CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
        CoreError::Internal(msg) => internal(msg),
    }
}

/// Classify a backup subsystem error into an HTTP status, error code, and
/// message. Storage faults are sanitised to a generic 500.
fn classify_backup_error(err: &BackupError) -> (StatusCode, &'static str, String) {
    match err {
        BackupError::Core(core) => classify_core_error(core),
        BackupError::Store(StoreError::Database(e)) => internal(e),
        BackupError::Store(StoreError::NotFound { entity, id }) => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("{entity} with id {id} not found"),
        ),
        BackupError::Store(StoreError::Conflict(msg)) => {
            (StatusCode::CONFLICT, "CONFLICT", msg.clone())
        }
        BackupError::Store(StoreError::Validation(msg)) => {
            (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
        }
        BackupError::Bucket(BucketError::NotFound(key)) => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("File {key} not found"),
        ),
        BackupError::Bucket(BucketError::InvalidKey(msg)) => {
            (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
        }
        BackupError::Bucket(e @ BucketError::Io { .. }) => internal(e),
        BackupError::Xml(e) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", e.to_string()),
        BackupError::JobNotFound { kind, id } => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("{kind} job with id {id} not found"),
        ),
        BackupError::NotRunnable { .. } => (StatusCode::CONFLICT, "CONFLICT", err.to_string()),
        BackupError::ShuttingDown => (
            StatusCode::SERVICE_UNAVAILABLE,
            "SHUTTING_DOWN",
            err.to_string(),
        ),
        BackupError::Cancelled(_) | BackupError::Panicked(_) => internal(err),
    }
}
