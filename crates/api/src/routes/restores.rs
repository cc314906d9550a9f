use axum::routing::get;
use axum::Router;

use crate::handlers::restores;
use crate::state::AppState;

/// Restore routes mounted at `/restores`.
///
/// ```text
/// GET    /                 -> list_restores
/// POST   /                 -> create_restore
/// GET    /running          -> running
/// GET    /{id}             -> get_restore
/// DELETE /{id}             -> delete_restore
/// GET    /{id}/steps       -> list_restore_steps
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(restores::list_restores).post(restores::create_restore))
        .route("/running", get(restores::running))
        .route(
            "/{id}",
            get(restores::get_restore).delete(restores::delete_restore),
        )
        .route("/{id}/steps", get(restores::list_restore_steps))
}
