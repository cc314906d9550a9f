/// Job records use PostgreSQL BIGSERIAL primary keys.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Inventory entities keep the opaque string IDs they were exported with.
pub type EntityId = String;
