//! Restore step (audit trail entry) model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use stockpile_core::backup::StepResult;
use stockpile_core::types::{DbId, Timestamp};

/// A row from the `restore_steps` table.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct RestoreStep {
    pub id: DbId,
    pub restore_operation_id: DbId,
    pub name: String,
    #[sqlx(try_from = "String")]
    pub result: StepResult,
    pub reason: String,
    pub created_date: Timestamp,
    pub updated_date: Timestamp,
}

/// DTO for appending a step.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateRestoreStep {
    pub restore_operation_id: DbId,
    pub name: String,
    pub result: StepResult,
    pub reason: String,
}
