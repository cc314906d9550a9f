use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use stockpile_core::types::EntityId;

/// A row from the `locations` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Location {
    pub id: EntityId,
    pub name: String,
    pub address: String,
}
