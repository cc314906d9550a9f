//! Repository for the `files` table (commodity attachments).

use sqlx::PgPool;

use crate::models::file::FileEntity;

const COLUMNS: &str = "id, commodity_id, kind, path, original_path, extension, mime_type";

/// Provides CRUD operations for attachment records. Bytes live in the bucket.
pub struct FileRepo;

impl FileRepo {
    pub async fn create(pool: &PgPool, file: &FileEntity) -> Result<FileEntity, sqlx::Error> {
        let query = format!(
            "INSERT INTO files (id, commodity_id, kind, path, original_path, extension, mime_type)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, FileEntity>(&query)
            .bind(&file.id)
            .bind(&file.commodity_id)
            .bind(file.kind.as_str())
            .bind(&file.path)
            .bind(&file.original_path)
            .bind(&file.extension)
            .bind(&file.mime_type)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<FileEntity>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM files WHERE id = $1");
        sqlx::query_as::<_, FileEntity>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list(pool: &PgPool) -> Result<Vec<FileEntity>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM files ORDER BY commodity_id, kind, id");
        sqlx::query_as::<_, FileEntity>(&query).fetch_all(pool).await
    }

    pub async fn update(pool: &PgPool, file: &FileEntity) -> Result<Option<FileEntity>, sqlx::Error> {
        let query = format!(
            "UPDATE files SET
                commodity_id = $2, kind = $3, path = $4,
                original_path = $5, extension = $6, mime_type = $7
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, FileEntity>(&query)
            .bind(&file.id)
            .bind(&file.commodity_id)
            .bind(file.kind.as_str())
            .bind(&file.path)
            .bind(&file.original_path)
            .bind(&file.extension)
            .bind(&file.mime_type)
            .fetch_optional(pool)
            .await
    }

    pub async fn delete(pool: &PgPool, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM files WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
