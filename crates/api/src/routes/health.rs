use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Whether the database is reachable. `null` on the in-memory stores.
    pub db_healthy: Option<bool>,
    /// Whether the worker pool still takes new jobs.
    pub accepting_jobs: bool,
}

/// GET /health -- returns service, database, and worker pool health.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_healthy = match &state.db {
        Some(pool) => Some(stockpile_db::health_check(pool).await.is_ok()),
        None => None,
    };
    let accepting_jobs = state.backup.pool().is_accepting();

    let status = if db_healthy != Some(false) && accepting_jobs {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        db_healthy,
        accepting_jobs,
    })
}

/// Mount health check routes (intended for root-level, NOT under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
