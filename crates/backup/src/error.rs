use stockpile_core::error::CoreError;
use stockpile_core::types::DbId;
use stockpile_db::StoreError;

use crate::bucket::BucketError;
use crate::job::JobKind;
use crate::xml::XmlError;

/// Error raised by the backup subsystem.
///
/// Inside an orchestrator every `Err` is job-fatal: per-item problems are
/// recorded as steps and counted, never returned.
#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    /// A precondition or lookup failure surfaced to the caller.
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Storage error: {0}")]
    Bucket(#[from] BucketError),

    #[error("Malformed backup document: {0}")]
    Xml(#[from] XmlError),

    #[error("{kind} job {id} not found")]
    JobNotFound { kind: JobKind, id: DbId },

    #[error("{kind} job {id} is not pending; it cannot be started again")]
    NotRunnable { kind: JobKind, id: DbId },

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Worker pool is shutting down")]
    ShuttingDown,

    #[error("Worker panicked: {0}")]
    Panicked(String),
}

impl BackupError {
    /// Whether the failure handler should leave the job record alone.
    ///
    /// A job that is not pending belongs to someone else (already terminal,
    /// or running under another submission); a missing job has been deleted.
    pub fn leaves_record_untouched(&self) -> bool {
        matches!(
            self,
            Self::NotRunnable { .. } | Self::JobNotFound { .. }
        )
    }
}
