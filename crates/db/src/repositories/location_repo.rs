//! Repository for the `locations` table.

use sqlx::PgPool;

use crate::models::location::Location;

const COLUMNS: &str = "id, name, address";

/// Provides CRUD operations for locations.
pub struct LocationRepo;

impl LocationRepo {
    pub async fn create(pool: &PgPool, location: &Location) -> Result<Location, sqlx::Error> {
        let query = format!(
            "INSERT INTO locations (id, name, address) VALUES ($1, $2, $3) RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Location>(&query)
            .bind(&location.id)
            .bind(&location.name)
            .bind(&location.address)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Location>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM locations WHERE id = $1");
        sqlx::query_as::<_, Location>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list(pool: &PgPool) -> Result<Vec<Location>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM locations ORDER BY name, id");
        sqlx::query_as::<_, Location>(&query).fetch_all(pool).await
    }

    pub async fn update(pool: &PgPool, location: &Location) -> Result<Option<Location>, sqlx::Error> {
        let query = format!(
            "UPDATE locations SET name = $2, address = $3 WHERE id = $1 RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Location>(&query)
            .bind(&location.id)
            .bind(&location.name)
            .bind(&location.address)
            .fetch_optional(pool)
            .await
    }

    pub async fn delete(pool: &PgPool, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM locations WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
