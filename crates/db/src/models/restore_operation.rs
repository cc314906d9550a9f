//! Restore operation model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use stockpile_core::backup::{JobStatus, RestoreStrategy};
use stockpile_core::stats::BackupStats;
use stockpile_core::types::{DbId, Timestamp};

use super::restore_step::RestoreStep;

/// Per-restore switches chosen at creation time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct RestoreOptions {
    #[serde(default)]
    pub include_file_data: bool,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub backup_existing: bool,
}

/// A row from the `restore_operations` table.
///
/// `steps` is not a column; it is filled in when the operation is loaded
/// for display.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct RestoreOperation {
    pub id: DbId,
    pub export_id: Option<DbId>,
    /// Bucket key of an uploaded document, when not restoring an export.
    pub source_file_path: Option<String>,
    pub description: String,
    #[sqlx(try_from = "String")]
    pub status: JobStatus,
    #[sqlx(try_from = "String")]
    pub strategy: RestoreStrategy,
    #[sqlx(flatten)]
    pub options: RestoreOptions,
    pub location_count: i32,
    pub area_count: i32,
    pub commodity_count: i32,
    pub image_count: i32,
    pub invoice_count: i32,
    pub manual_count: i32,
    pub binary_data_size: i64,
    pub created_count: i32,
    pub updated_count: i32,
    pub skipped_count: i32,
    pub deleted_count: i32,
    pub error_count: i32,
    pub error_message: Option<String>,
    pub created_date: Timestamp,
    pub started_date: Option<Timestamp>,
    pub completed_date: Option<Timestamp>,
    #[sqlx(skip)]
    pub steps: Vec<RestoreStep>,
}

impl RestoreOperation {
    /// Copy the accumulated counters onto the record.
    pub fn apply_stats(&mut self, stats: &BackupStats) {
        self.location_count = stats.location_count;
        self.area_count = stats.area_count;
        self.commodity_count = stats.commodity_count;
        self.image_count = stats.image_count;
        self.invoice_count = stats.invoice_count;
        self.manual_count = stats.manual_count;
        self.binary_data_size = stats.binary_data_size;
        self.created_count = stats.created_count;
        self.updated_count = stats.updated_count;
        self.skipped_count = stats.skipped_count;
        self.deleted_count = stats.deleted_count;
        self.error_count = stats.error_count;
    }
}

/// DTO for creating a new restore operation.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateRestoreOperation {
    pub export_id: Option<DbId>,
    pub source_file_path: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub strategy: RestoreStrategy,
    #[serde(default)]
    pub options: RestoreOptions,
}
