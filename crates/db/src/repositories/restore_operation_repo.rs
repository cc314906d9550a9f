//! Repository for the `restore_operations` table.

use sqlx::PgPool;
use stockpile_core::backup::JobStatus;
use stockpile_core::types::DbId;

use super::status_names;
use crate::models::restore_operation::{CreateRestoreOperation, RestoreOperation};

/// Column list for `restore_operations` queries.
const COLUMNS: &str = "id, export_id, source_file_path, description, status, strategy, \
    include_file_data, dry_run, backup_existing, \
    location_count, area_count, commodity_count, image_count, invoice_count, manual_count, \
    binary_data_size, created_count, updated_count, skipped_count, deleted_count, \
    error_count, error_message, created_date, started_date, completed_date";

/// Provides CRUD operations for restore operations.
pub struct RestoreOperationRepo;

impl RestoreOperationRepo {
    /// Insert a new pending restore operation, returning the created row.
    pub async fn create(
        pool: &PgPool,
        input: &CreateRestoreOperation,
    ) -> Result<RestoreOperation, sqlx::Error> {
        let query = format!(
            "INSERT INTO restore_operations
                (export_id, source_file_path, description, status, strategy,
                 include_file_data, dry_run, backup_existing)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, RestoreOperation>(&query)
            .bind(input.export_id)
            .bind(&input.source_file_path)
            .bind(input.description.as_deref().unwrap_or_default())
            .bind(JobStatus::Pending.as_str())
            .bind(input.strategy.as_str())
            .bind(input.options.include_file_data)
            .bind(input.options.dry_run)
            .bind(input.options.backup_existing)
            .fetch_one(pool)
            .await
    }

    /// Find a restore operation by ID (without steps).
    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<RestoreOperation>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM restore_operations WHERE id = $1");
        sqlx::query_as::<_, RestoreOperation>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List all restore operations, newest first.
    pub async fn list(pool: &PgPool) -> Result<Vec<RestoreOperation>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM restore_operations ORDER BY created_date DESC, id DESC"
        );
        sqlx::query_as::<_, RestoreOperation>(&query)
            .fetch_all(pool)
            .await
    }

    /// List the restore operations created from one export, newest first.
    pub async fn list_by_export(
        pool: &PgPool,
        export_id: DbId,
    ) -> Result<Vec<RestoreOperation>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM restore_operations
             WHERE export_id = $1
             ORDER BY created_date DESC, id DESC"
        );
        sqlx::query_as::<_, RestoreOperation>(&query)
            .bind(export_id)
            .fetch_all(pool)
            .await
    }

    /// List restore operations in any of the given statuses, oldest first.
    pub async fn list_by_status(
        pool: &PgPool,
        statuses: &[JobStatus],
    ) -> Result<Vec<RestoreOperation>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM restore_operations
             WHERE status = ANY($1)
             ORDER BY created_date ASC, id ASC"
        );
        sqlx::query_as::<_, RestoreOperation>(&query)
            .bind(status_names(statuses))
            .fetch_all(pool)
            .await
    }

    /// Overwrite the mutable fields of an existing restore operation.
    ///
    /// Returns `None` if the row no longer exists.
    pub async fn update(
        pool: &PgPool,
        op: &RestoreOperation,
    ) -> Result<Option<RestoreOperation>, sqlx::Error> {
        let query = format!(
            "UPDATE restore_operations SET
                description = $2,
                status = $3,
                location_count = $4,
                area_count = $5,
                commodity_count = $6,
                image_count = $7,
                invoice_count = $8,
                manual_count = $9,
                binary_data_size = $10,
                created_count = $11,
                updated_count = $12,
                skipped_count = $13,
                deleted_count = $14,
                error_count = $15,
                error_message = $16,
                started_date = $17,
                completed_date = $18
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, RestoreOperation>(&query)
            .bind(op.id)
            .bind(&op.description)
            .bind(op.status.as_str())
            .bind(op.location_count)
            .bind(op.area_count)
            .bind(op.commodity_count)
            .bind(op.image_count)
            .bind(op.invoice_count)
            .bind(op.manual_count)
            .bind(op.binary_data_size)
            .bind(op.created_count)
            .bind(op.updated_count)
            .bind(op.skipped_count)
            .bind(op.deleted_count)
            .bind(op.error_count)
            .bind(&op.error_message)
            .bind(op.started_date)
            .bind(op.completed_date)
            .fetch_optional(pool)
            .await
    }

    /// Hard-delete a restore operation unless it is running; its steps go
    /// with it (FK cascade). Returns `true` if a row was removed.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("DELETE FROM restore_operations WHERE id = $1 AND status <> $2")
                .bind(id)
                .bind(JobStatus::Running.as_str())
                .execute(pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }
}
