use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use stockpile_core::backup::FileKind;
use stockpile_core::types::EntityId;

/// A row from the `files` table: one attachment of a commodity.
///
/// `path` is the bucket key holding the bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct FileEntity {
    pub id: EntityId,
    pub commodity_id: EntityId,
    #[sqlx(try_from = "String")]
    pub kind: FileKind,
    pub path: String,
    pub original_path: String,
    pub extension: String,
    pub mime_type: String,
}
