//! The `<inventory>` backup document.
//!
//! ```xml
//! <inventory exportDate="..." exportType="full_database">
//!   <locations><location id="..">..</location></locations>
//!   <areas><area id="..">..</area></areas>
//!   <commodities>
//!     <commodity id="..">
//!       ..
//!       <images><file id=".."><path>..</path><data>base64</data></file></images>
//!       <invoices/>
//!       <manuals/>
//!     </commodity>
//!   </commodities>
//! </inventory>
//! ```
//!
//! Decoding is strict: the whole document is tokenized into a tree before a
//! single record is produced, so a truncated or mismatched document fails
//! before any entity is touched.

mod decode;
mod dom;
mod encode;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use stockpile_core::backup::FileKind;
use stockpile_db::models::area::Area;
use stockpile_db::models::commodity::Commodity;
use stockpile_db::models::file::FileEntity;
use stockpile_db::models::location::Location;

pub use decode::decode_inventory;
pub use encode::encode_inventory;

/// Date format of commodity date fields.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, thiserror::Error)]
pub enum XmlError {
    /// Not well-formed: bad syntax, mismatched or unclosed tags.
    #[error("{0}")]
    Malformed(String),

    /// Well-formed, but not an inventory document.
    #[error("{0}")]
    Invalid(String),

    #[error("XML write failed: {0}")]
    Write(String),
}

/// One attachment with its optional base64 payload.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentFile {
    pub file: FileEntity,
    /// Base64 text exactly as carried in `<data>`.
    pub data: Option<String>,
}

impl DocumentFile {
    pub fn without_data(file: FileEntity) -> Self {
        Self { file, data: None }
    }

    pub fn with_bytes(file: FileEntity, bytes: &[u8]) -> Self {
        Self {
            file,
            data: Some(STANDARD.encode(bytes)),
        }
    }

    /// Decode the payload, if any.
    pub fn bytes(&self) -> Result<Option<Vec<u8>>, base64::DecodeError> {
        self.data
            .as_deref()
            .map(|text| STANDARD.decode(text.trim()))
            .transpose()
    }
}

/// A backup document in declaration order.
///
/// `files` holds attachments of every commodity; the encoder nests each one
/// under its commodity, the decoder flattens them back in document order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InventoryDocument {
    pub export_date: Option<String>,
    pub export_type: Option<String>,
    pub locations: Vec<Location>,
    pub areas: Vec<Area>,
    pub commodities: Vec<Commodity>,
    pub files: Vec<DocumentFile>,
}

impl InventoryDocument {
    /// Attachments of one category, in document order.
    pub fn files_of(&self, kind: FileKind) -> impl Iterator<Item = &DocumentFile> {
        self.files.iter().filter(move |f| f.file.kind == kind)
    }
}

/// Wrapper element holding a commodity's files of `kind`.
pub(crate) fn files_element(kind: FileKind) -> &'static str {
    match kind {
        FileKind::Image => "images",
        FileKind::Invoice => "invoices",
        FileKind::Manual => "manuals",
    }
}
