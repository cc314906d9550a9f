pub mod exports;
pub mod health;
pub mod restores;

use axum::routing::post;
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /exports                      list, create
/// /exports/{id}                 get, delete
/// /exports/{id}/restores        list, create restore from the export
/// /exports/{id}/steps           steps of every restore of the export
///
/// /uploads                      store a raw XML document (POST)
///
/// /restores                     list, create
/// /restores/running             whether any restore is pending or running
/// /restores/{id}                get with steps, delete
/// /restores/{id}/steps          ordered step list
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/exports", exports::router())
        .nest("/restores", restores::router())
        .route("/uploads", post(handlers::uploads::upload))
}
