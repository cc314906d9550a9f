use axum::routing::get;
use axum::Router;

use crate::handlers::exports;
use crate::state::AppState;

/// Export routes mounted at `/exports`.
///
/// ```text
/// GET    /                 -> list_exports
/// POST   /                 -> create_export
/// GET    /{id}             -> get_export
/// DELETE /{id}             -> delete_export
/// GET    /{id}/restores    -> list_export_restores
/// POST   /{id}/restores    -> create_export_restore
/// GET    /{id}/steps       -> list_export_steps
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(exports::list_exports).post(exports::create_export))
        .route(
            "/{id}",
            get(exports::get_export).delete(exports::delete_export),
        )
        .route(
            "/{id}/restores",
            get(exports::list_export_restores).post(exports::create_export_restore),
        )
        .route("/{id}/steps", get(exports::list_export_steps))
}
