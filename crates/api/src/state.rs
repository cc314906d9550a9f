use std::sync::Arc;

use stockpile_backup::BackupService;
use stockpile_db::DbPool;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
#[derive(Clone)]
pub struct AppState {
    /// Job creation and lookup.
    pub backup: BackupService,
    pub config: Arc<ServerConfig>,
    /// Postgres pool, absent when running on the in-memory stores.
    pub db: Option<DbPool>,
}
