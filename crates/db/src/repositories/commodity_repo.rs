//! Repository for the `commodities` table.

use sqlx::PgPool;

use crate::models::commodity::Commodity;

const COLUMNS: &str = "id, name, short_name, commodity_type, area_id, count, \
    original_price, original_price_currency, converted_original_price, current_price, \
    serial_number, extra_serial_numbers, part_numbers, tags, status, \
    purchase_date, registered_date, last_modified_date, urls, comments, draft";

/// Provides CRUD operations for commodities.
pub struct CommodityRepo;

impl CommodityRepo {
    pub async fn create(pool: &PgPool, c: &Commodity) -> Result<Commodity, sqlx::Error> {
        let query = format!(
            "INSERT INTO commodities ({COLUMNS})
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11,
                     $12, $13, $14, $15, $16, $17, $18, $19, $20, $21)
             RETURNING {COLUMNS}"
        );
        Self::bind_all(sqlx::query_as::<_, Commodity>(&query), c)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Commodity>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM commodities WHERE id = $1");
        sqlx::query_as::<_, Commodity>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list(pool: &PgPool) -> Result<Vec<Commodity>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM commodities ORDER BY name, id");
        sqlx::query_as::<_, Commodity>(&query).fetch_all(pool).await
    }

    pub async fn update(pool: &PgPool, c: &Commodity) -> Result<Option<Commodity>, sqlx::Error> {
        let query = format!(
            "UPDATE commodities SET
                name = $2, short_name = $3, commodity_type = $4, area_id = $5, count = $6,
                original_price = $7, original_price_currency = $8,
                converted_original_price = $9, current_price = $10,
                serial_number = $11, extra_serial_numbers = $12, part_numbers = $13,
                tags = $14, status = $15, purchase_date = $16, registered_date = $17,
                last_modified_date = $18, urls = $19, comments = $20, draft = $21
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        Self::bind_all(sqlx::query_as::<_, Commodity>(&query), c)
            .fetch_optional(pool)
            .await
    }

    pub async fn delete(pool: &PgPool, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM commodities WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Bind every column in `COLUMNS` order; insert and update share it.
    fn bind_all<'q>(
        query: sqlx::query::QueryAs<'q, sqlx::Postgres, Commodity, sqlx::postgres::PgArguments>,
        c: &'q Commodity,
    ) -> sqlx::query::QueryAs<'q, sqlx::Postgres, Commodity, sqlx::postgres::PgArguments> {
        query
            .bind(&c.id)
            .bind(&c.name)
            .bind(&c.short_name)
            .bind(&c.commodity_type)
            .bind(&c.area_id)
            .bind(c.count)
            .bind(c.original_price)
            .bind(&c.original_price_currency)
            .bind(c.converted_original_price)
            .bind(c.current_price)
            .bind(&c.serial_number)
            .bind(&c.extra_serial_numbers)
            .bind(&c.part_numbers)
            .bind(&c.tags)
            .bind(&c.status)
            .bind(c.purchase_date)
            .bind(c.registered_date)
            .bind(c.last_modified_date)
            .bind(&c.urls)
            .bind(&c.comments)
            .bind(c.draft)
    }
}
