//! Repository for the `areas` table.

use sqlx::PgPool;

use crate::models::area::Area;

const COLUMNS: &str = "id, name, location_id";

/// Provides CRUD operations for areas.
pub struct AreaRepo;

impl AreaRepo {
    pub async fn create(pool: &PgPool, area: &Area) -> Result<Area, sqlx::Error> {
        let query = format!(
            "INSERT INTO areas (id, name, location_id) VALUES ($1, $2, $3) RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Area>(&query)
            .bind(&area.id)
            .bind(&area.name)
            .bind(&area.location_id)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Area>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM areas WHERE id = $1");
        sqlx::query_as::<_, Area>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list(pool: &PgPool) -> Result<Vec<Area>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM areas ORDER BY name, id");
        sqlx::query_as::<_, Area>(&query).fetch_all(pool).await
    }

    pub async fn update(pool: &PgPool, area: &Area) -> Result<Option<Area>, sqlx::Error> {
        let query = format!(
            "UPDATE areas SET name = $2, location_id = $3 WHERE id = $1 RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Area>(&query)
            .bind(&area.id)
            .bind(&area.name)
            .bind(&area.location_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn delete(pool: &PgPool, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM areas WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
