//! Repository for the `restore_steps` table.

use sqlx::PgPool;
use stockpile_core::types::DbId;

use crate::models::restore_step::{CreateRestoreStep, RestoreStep};

/// Column list for `restore_steps` queries.
const COLUMNS: &str =
    "id, restore_operation_id, name, result, reason, created_date, updated_date";

/// Provides append/update/list operations for restore steps.
pub struct RestoreStepRepo;

impl RestoreStepRepo {
    /// Append a step.
    pub async fn create(
        pool: &PgPool,
        input: &CreateRestoreStep,
    ) -> Result<RestoreStep, sqlx::Error> {
        let query = format!(
            "INSERT INTO restore_steps (restore_operation_id, name, result, reason)
             VALUES ($1, $2, $3, $4)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, RestoreStep>(&query)
            .bind(input.restore_operation_id)
            .bind(&input.name)
            .bind(input.result.as_str())
            .bind(&input.reason)
            .fetch_one(pool)
            .await
    }

    /// Rewrite a step's result and reason, bumping `updated_date`.
    pub async fn update(
        pool: &PgPool,
        step: &RestoreStep,
    ) -> Result<Option<RestoreStep>, sqlx::Error> {
        let query = format!(
            "UPDATE restore_steps SET
                result = $2,
                reason = $3,
                updated_date = clock_timestamp()
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, RestoreStep>(&query)
            .bind(step.id)
            .bind(step.result.as_str())
            .bind(&step.reason)
            .fetch_optional(pool)
            .await
    }

    /// Steps of one restore operation in timeline order.
    pub async fn list_by_restore_operation(
        pool: &PgPool,
        restore_operation_id: DbId,
    ) -> Result<Vec<RestoreStep>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM restore_steps
             WHERE restore_operation_id = $1
             ORDER BY created_date ASC, id ASC"
        );
        sqlx::query_as::<_, RestoreStep>(&query)
            .bind(restore_operation_id)
            .fetch_all(pool)
            .await
    }

    /// Steps of every restore operation created from one export.
    pub async fn list_by_export(
        pool: &PgPool,
        export_id: DbId,
    ) -> Result<Vec<RestoreStep>, sqlx::Error> {
        let query = "SELECT s.id, s.restore_operation_id, s.name, s.result, s.reason, \
                s.created_date, s.updated_date
             FROM restore_steps s
             JOIN restore_operations o ON o.id = s.restore_operation_id
             WHERE o.export_id = $1
             ORDER BY s.restore_operation_id ASC, s.created_date ASC, s.id ASC";
        sqlx::query_as::<_, RestoreStep>(query)
            .bind(export_id)
            .fetch_all(pool)
            .await
    }
}
