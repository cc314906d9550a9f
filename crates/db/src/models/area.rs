use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use stockpile_core::types::EntityId;

/// A row from the `areas` table. Every area sits in one location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Area {
    pub id: EntityId,
    pub name: String,
    pub location_id: EntityId,
}
