//! Export job model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use stockpile_core::backup::{ExportType, JobStatus, SelectedItem};
use stockpile_core::stats::BackupStats;
use stockpile_core::types::{DbId, Timestamp};

/// A row from the `exports` table.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Export {
    pub id: DbId,
    #[serde(rename = "type")]
    #[sqlx(try_from = "String")]
    pub export_type: ExportType,
    pub description: String,
    #[sqlx(try_from = "String")]
    pub status: JobStatus,
    pub include_file_data: bool,
    #[sqlx(json)]
    pub selected_items: Vec<SelectedItem>,
    /// Bucket key of the produced XML. Set only once completed.
    pub file_path: Option<String>,
    pub file_size: i64,
    pub location_count: i32,
    pub area_count: i32,
    pub commodity_count: i32,
    pub image_count: i32,
    pub invoice_count: i32,
    pub manual_count: i32,
    pub binary_data_size: i64,
    pub error_count: i32,
    pub error_message: Option<String>,
    pub created_date: Timestamp,
    pub started_date: Option<Timestamp>,
    pub completed_date: Option<Timestamp>,
}

impl Export {
    /// Copy the accumulated counters onto the record.
    pub fn apply_stats(&mut self, stats: &BackupStats) {
        self.location_count = stats.location_count;
        self.area_count = stats.area_count;
        self.commodity_count = stats.commodity_count;
        self.image_count = stats.image_count;
        self.invoice_count = stats.invoice_count;
        self.manual_count = stats.manual_count;
        self.binary_data_size = stats.binary_data_size;
        self.error_count = stats.error_count;
    }
}

/// DTO for creating a new export.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateExport {
    #[serde(rename = "type")]
    pub export_type: ExportType,
    pub description: String,
    #[serde(default)]
    pub include_file_data: bool,
    #[serde(default)]
    pub selected_items: Vec<SelectedItem>,
}
