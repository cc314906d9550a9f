//! Repository for the `exports` table.

use sqlx::types::Json;
use sqlx::PgPool;
use stockpile_core::backup::JobStatus;
use stockpile_core::types::DbId;

use super::status_names;
use crate::models::export::{CreateExport, Export};

/// Column list for `exports` queries.
const COLUMNS: &str = "id, export_type, description, status, include_file_data, \
    selected_items, file_path, file_size, \
    location_count, area_count, commodity_count, image_count, invoice_count, manual_count, \
    binary_data_size, error_count, error_message, \
    created_date, started_date, completed_date";

/// Provides CRUD operations for export jobs.
pub struct ExportRepo;

impl ExportRepo {
    /// Insert a new pending export, returning the created row.
    pub async fn create(pool: &PgPool, input: &CreateExport) -> Result<Export, sqlx::Error> {
        let query = format!(
            "INSERT INTO exports (export_type, description, status, include_file_data, selected_items)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Export>(&query)
            .bind(input.export_type.as_str())
            .bind(&input.description)
            .bind(JobStatus::Pending.as_str())
            .bind(input.include_file_data)
            .bind(Json(&input.selected_items))
            .fetch_one(pool)
            .await
    }

    /// Find an export by ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Export>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM exports WHERE id = $1");
        sqlx::query_as::<_, Export>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List all exports, newest first.
    pub async fn list(pool: &PgPool) -> Result<Vec<Export>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM exports ORDER BY created_date DESC, id DESC");
        sqlx::query_as::<_, Export>(&query).fetch_all(pool).await
    }

    /// List exports in any of the given statuses, oldest first.
    pub async fn list_by_status(
        pool: &PgPool,
        statuses: &[JobStatus],
    ) -> Result<Vec<Export>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM exports
             WHERE status = ANY($1)
             ORDER BY created_date ASC, id ASC"
        );
        sqlx::query_as::<_, Export>(&query)
            .bind(status_names(statuses))
            .fetch_all(pool)
            .await
    }

    /// Overwrite the mutable fields of an existing export.
    ///
    /// Returns `None` if the row no longer exists.
    pub async fn update(pool: &PgPool, export: &Export) -> Result<Option<Export>, sqlx::Error> {
        let query = format!(
            "UPDATE exports SET
                description = $2,
                status = $3,
                file_path = $4,
                file_size = $5,
                location_count = $6,
                area_count = $7,
                commodity_count = $8,
                image_count = $9,
                invoice_count = $10,
                manual_count = $11,
                binary_data_size = $12,
                error_count = $13,
                error_message = $14,
                started_date = $15,
                completed_date = $16
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Export>(&query)
            .bind(export.id)
            .bind(&export.description)
            .bind(export.status.as_str())
            .bind(&export.file_path)
            .bind(export.file_size)
            .bind(export.location_count)
            .bind(export.area_count)
            .bind(export.commodity_count)
            .bind(export.image_count)
            .bind(export.invoice_count)
            .bind(export.manual_count)
            .bind(export.binary_data_size)
            .bind(export.error_count)
            .bind(&export.error_message)
            .bind(export.started_date)
            .bind(export.completed_date)
            .fetch_optional(pool)
            .await
    }

    /// Hard-delete an export unless it or one of its restores is running.
    /// Returns `true` if a row was removed.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM exports
             WHERE id = $1 AND status <> $2
               AND NOT EXISTS (
                   SELECT 1 FROM restore_operations
                   WHERE export_id = $1 AND status = $2
               )",
        )
        .bind(id)
        .bind(JobStatus::Running.as_str())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
