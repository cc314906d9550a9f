//! Aggregate counters produced by a backup job.

use serde::{Deserialize, Serialize};

use crate::backup::EntityKind;
use crate::strategy::RestoreAction;

/// Maximum number of per-item error messages retained in memory.
///
/// The count keeps growing past this; only the message list is capped.
pub const MAX_RETAINED_ERRORS: usize = 100;

/// Per-entity counts plus error and action tallies for one job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupStats {
    pub location_count: i32,
    pub area_count: i32,
    pub commodity_count: i32,
    pub image_count: i32,
    pub invoice_count: i32,
    pub manual_count: i32,
    pub binary_data_size: i64,
    pub error_count: i32,
    pub created_count: i32,
    pub updated_count: i32,
    pub skipped_count: i32,
    pub deleted_count: i32,
    pub errors: Vec<String>,
}

impl BackupStats {
    /// Count one successfully handled entity of `kind`.
    pub fn record_entity(&mut self, kind: EntityKind) {
        let counter = match kind {
            EntityKind::Location => &mut self.location_count,
            EntityKind::Area => &mut self.area_count,
            EntityKind::Commodity => &mut self.commodity_count,
            EntityKind::Image => &mut self.image_count,
            EntityKind::Invoice => &mut self.invoice_count,
            EntityKind::Manual => &mut self.manual_count,
        };
        *counter += 1;
    }

    /// Count the resolved action for one restored entity.
    pub fn record_action(&mut self, action: RestoreAction) {
        match action {
            RestoreAction::Create => self.created_count += 1,
            RestoreAction::Update => self.updated_count += 1,
            RestoreAction::Skip => self.skipped_count += 1,
        }
    }

    /// Count a per-item failure. The job keeps going.
    pub fn record_error(&mut self, message: impl Into<String>) {
        self.error_count += 1;
        if self.errors.len() < MAX_RETAINED_ERRORS {
            self.errors.push(message.into());
        }
    }

    /// Add attachment bytes moved by the job.
    pub fn add_binary(&mut self, bytes: usize) {
        self.binary_data_size += i64::try_from(bytes).unwrap_or(i64::MAX);
    }

    /// Number of successfully handled entities of `kind`.
    pub fn count(&self, kind: EntityKind) -> i32 {
        match kind {
            EntityKind::Location => self.location_count,
            EntityKind::Area => self.area_count,
            EntityKind::Commodity => self.commodity_count,
            EntityKind::Image => self.image_count,
            EntityKind::Invoice => self.invoice_count,
            EntityKind::Manual => self.manual_count,
        }
    }
}
