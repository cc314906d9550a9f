//! Core types, constants, and pure validation for backup exports and
//! restore operations.
//!
//! Every status-like value the subsystem persists is a closed enum here with
//! a stable snake_case name used both on the wire and in the database.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::EntityId;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Maximum length of an export description.
pub const MAX_DESCRIPTION_LENGTH: usize = 1024;

/// Maximum number of explicitly selected items in one export.
pub const MAX_SELECTED_ITEMS: usize = 10_000;

/// Bucket prefix for produced export documents.
pub const EXPORTS_PREFIX: &str = "exports";

/// Bucket prefix for raw uploaded restore sources.
pub const UPLOADS_PREFIX: &str = "uploads";

/// Bucket prefix for attachment bytes written by a restore.
pub const FILES_PREFIX: &str = "files";

// ---------------------------------------------------------------------------
// String enum helper
// ---------------------------------------------------------------------------

macro_rules! define_string_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $text:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$name] = &[$( $name::$variant ),+];

            /// Return the name as stored in the database.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( Self::$variant => $text ),+
                }
            }

            /// Parse a stored name. Returns `None` for unknown values.
            pub fn parse(s: &str) -> Option<Self> {
                match s {
                    $( $text => Some(Self::$variant), )+
                    _ => None,
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl TryFrom<String> for $name {
            type Error = CoreError;

            fn try_from(value: String) -> Result<Self, CoreError> {
                Self::parse(&value).ok_or_else(|| {
                    CoreError::Validation(format!(
                        "Unknown {} value: \"{value}\"",
                        stringify!($name)
                    ))
                })
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Job status
// ---------------------------------------------------------------------------

define_string_enum! {
    /// Lifecycle status shared by exports and restore operations.
    JobStatus {
        Pending => "pending",
        Running => "running",
        Completed => "completed",
        Failed => "failed",
    }
}

impl JobStatus {
    /// Completed and failed are absorbing.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Pending or running.
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Whether a job may move from `self` to `next`.
    ///
    /// Transitions only go forward. A pending job may fail without ever
    /// running (shutdown before a slot frees up, restart recovery).
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Pending, Self::Failed)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Failed)
        )
    }
}

// ---------------------------------------------------------------------------
// Export type
// ---------------------------------------------------------------------------

define_string_enum! {
    /// What an export snapshots.
    ExportType {
        FullDatabase => "full_database",
        SelectedItems => "selected_items",
        Locations => "locations",
        Areas => "areas",
        Commodities => "commodities",
    }
}

// ---------------------------------------------------------------------------
// Restore strategy
// ---------------------------------------------------------------------------

define_string_enum! {
    /// Conflict-resolution policy for a restore.
    RestoreStrategy {
        /// Clear the destination, then create everything from the snapshot.
        #[serde(alias = "full-replace")]
        FullReplace => "full_replace",
        /// Create only what is absent; leave existing entities untouched.
        #[serde(alias = "merge-add")]
        MergeAdd => "merge_add",
        /// Create what is absent; overwrite what exists.
        #[serde(alias = "merge-update")]
        MergeUpdate => "merge_update",
    }
}

// ---------------------------------------------------------------------------
// Step result
// ---------------------------------------------------------------------------

define_string_enum! {
    /// Outcome recorded on a restore step.
    StepResult {
        InProgress => "in_progress",
        Success => "success",
        Skipped => "skipped",
        Error => "error",
    }
}

impl StepResult {
    /// Icon prefixed to per-entity step names.
    pub fn icon(&self) -> &'static str {
        match self {
            Self::InProgress => "⏳",
            Self::Success => "✅",
            Self::Skipped => "⏭️",
            Self::Error => "❌",
        }
    }
}

// ---------------------------------------------------------------------------
// Entity kinds
// ---------------------------------------------------------------------------

define_string_enum! {
    /// Attachment category of a stored file.
    FileKind {
        Image => "image",
        Invoice => "invoice",
        Manual => "manual",
    }
}

define_string_enum! {
    /// Every entity category the backup subsystem moves.
    EntityKind {
        Location => "location",
        Area => "area",
        Commodity => "commodity",
        Image => "image",
        Invoice => "invoice",
        Manual => "manual",
    }
}

impl EntityKind {
    /// Referential dependency order used by every restore.
    pub const PROCESSING_ORDER: [EntityKind; 6] = [
        Self::Location,
        Self::Area,
        Self::Commodity,
        Self::Image,
        Self::Invoice,
        Self::Manual,
    ];

    /// Human label, e.g. `"Location"`.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Location => "Location",
            Self::Area => "Area",
            Self::Commodity => "Commodity",
            Self::Image => "Image",
            Self::Invoice => "Invoice",
            Self::Manual => "Manual",
        }
    }

    /// Plural collection name, e.g. `"locations"`.
    pub fn plural(&self) -> &'static str {
        match self {
            Self::Location => "locations",
            Self::Area => "areas",
            Self::Commodity => "commodities",
            Self::Image => "images",
            Self::Invoice => "invoices",
            Self::Manual => "manuals",
        }
    }

    /// The attachment kind, if this is a file category.
    pub fn file_kind(&self) -> Option<FileKind> {
        match self {
            Self::Image => Some(FileKind::Image),
            Self::Invoice => Some(FileKind::Invoice),
            Self::Manual => Some(FileKind::Manual),
            Self::Location | Self::Area | Self::Commodity => None,
        }
    }
}

impl From<FileKind> for EntityKind {
    fn from(kind: FileKind) -> Self {
        match kind {
            FileKind::Image => Self::Image,
            FileKind::Invoice => Self::Invoice,
            FileKind::Manual => Self::Manual,
        }
    }
}

// ---------------------------------------------------------------------------
// Selected items
// ---------------------------------------------------------------------------

/// One explicitly chosen root for a `selected_items` export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedItem {
    pub id: EntityId,
    pub kind: EntityKind,
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate an export description: required, bounded length.
pub fn validate_description(description: &str) -> Result<(), CoreError> {
    if description.trim().is_empty() {
        return Err(CoreError::Validation(
            "Description must not be empty".to_string(),
        ));
    }
    if description.chars().count() > MAX_DESCRIPTION_LENGTH {
        return Err(CoreError::Validation(format!(
            "Description must not exceed {MAX_DESCRIPTION_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Validate the selection list against the export type.
///
/// Rules:
/// - `selected_items` exports need at least one item, at most
///   [`MAX_SELECTED_ITEMS`].
/// - Items must be locations, areas, or commodities with non-empty IDs.
/// - Every other export type must not carry a selection.
pub fn validate_selected_items(
    export_type: ExportType,
    items: &[SelectedItem],
) -> Result<(), CoreError> {
    if export_type != ExportType::SelectedItems {
        if !items.is_empty() {
            return Err(CoreError::Validation(format!(
                "Selected items are only allowed for {} exports",
                ExportType::SelectedItems
            )));
        }
        return Ok(());
    }

    if items.is_empty() {
        return Err(CoreError::Validation(
            "At least one item must be selected".to_string(),
        ));
    }
    if items.len() > MAX_SELECTED_ITEMS {
        return Err(CoreError::Validation(format!(
            "At most {MAX_SELECTED_ITEMS} items may be selected"
        )));
    }
    for (i, item) in items.iter().enumerate() {
        if item.id.trim().is_empty() {
            return Err(CoreError::Validation(format!(
                "Selected item at index {i} has an empty id"
            )));
        }
        if item.kind.file_kind().is_some() {
            return Err(CoreError::Validation(format!(
                "Selected item at index {i} must be a location, area, or commodity"
            )));
        }
    }
    Ok(())
}

/// Validate that a restore has exactly one source and a coherent option set.
///
/// Full replace clears the destination, which has no dry-run counterpart,
/// so the combination is refused before the job exists.
pub fn validate_restore_request(
    has_export: bool,
    has_source_file: bool,
    strategy: RestoreStrategy,
    dry_run: bool,
) -> Result<(), CoreError> {
    match (has_export, has_source_file) {
        (false, false) => {
            return Err(CoreError::Validation(
                "Either export_id or source_file_path is required".to_string(),
            ))
        }
        (true, true) => {
            return Err(CoreError::Validation(
                "export_id and source_file_path are mutually exclusive".to_string(),
            ))
        }
        _ => {}
    }
    if strategy == RestoreStrategy::FullReplace && dry_run {
        return Err(CoreError::Validation(
            "full_replace cannot be combined with dry_run".to_string(),
        ));
    }
    Ok(())
}

/// Validate a bucket key supplied by a client (upload side channel).
pub fn validate_source_file_path(path: &str) -> Result<(), CoreError> {
    if path.trim().is_empty() {
        return Err(CoreError::Validation(
            "source_file_path must not be empty".to_string(),
        ));
    }
    if path.starts_with('/') || path.split('/').any(|seg| seg == "..") {
        return Err(CoreError::Validation(
            "source_file_path must be a relative bucket key".to_string(),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
