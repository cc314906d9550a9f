//! Shared job plumbing: the collaborator bundle handed to every job, the
//! request the pool schedules, and the failure path.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use stockpile_core::backup::{JobStatus, StepResult};
use stockpile_core::types::DbId;
use stockpile_db::store::{JobStore, RegistrySet};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::bucket::Bucket;
use crate::error::BackupError;
use crate::steps::StepRecorder;

/// Everything a job reads from and writes to.
#[derive(Clone)]
pub struct BackupContext {
    pub store: Arc<dyn JobStore>,
    pub registries: RegistrySet,
    pub bucket: Arc<dyn Bucket>,
    /// Export slots of the pool running this context's jobs. Unset outside
    /// a pool, where exports started from a restore are not limited.
    export_slots: Option<Arc<Semaphore>>,
}

impl BackupContext {
    pub fn new(store: Arc<dyn JobStore>, registries: RegistrySet, bucket: Arc<dyn Bucket>) -> Self {
        Self {
            store,
            registries,
            bucket,
            export_slots: None,
        }
    }

    pub(crate) fn with_export_slots(mut self, slots: Arc<Semaphore>) -> Self {
        self.export_slots = Some(slots);
        self
    }

    /// Wait for an export slot, giving up when `cancel` fires.
    ///
    /// Returns `None` when the context has no pool behind it.
    pub(crate) async fn acquire_export_slot(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Option<OwnedSemaphorePermit>, BackupError> {
        let Some(slots) = &self.export_slots else {
            return Ok(None);
        };
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(BackupError::Cancelled(
                "interrupted by shutdown while waiting for an export slot".to_string(),
            )),
            permit = slots.clone().acquire_owned() => {
                permit.map(Some).map_err(|_| BackupError::ShuttingDown)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    Export,
    Restore,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Export => "export",
            Self::Restore => "restore",
        })
    }
}

/// Tenant and user a job runs on behalf of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub tenant_id: String,
    pub user_id: String,
}

impl Actor {
    pub fn new(tenant_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            user_id: user_id.into(),
        }
    }

    /// Identity for jobs the process starts itself (restart recovery).
    pub fn system() -> Self {
        Self::new("system", "system")
    }
}

impl Default for Actor {
    fn default() -> Self {
        Self::new("default", "anonymous")
    }
}

/// One unit of work for the pool.
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub kind: JobKind,
    pub id: DbId,
    pub actor: Actor,
}

impl JobRequest {
    pub fn export(id: DbId, actor: Actor) -> Self {
        Self {
            kind: JobKind::Export,
            id,
            actor,
        }
    }

    pub fn restore(id: DbId, actor: Actor) -> Self {
        Self {
            kind: JobKind::Restore,
            id,
            actor,
        }
    }
}

/// Move a job to `failed` with `message`, if its status still allows it.
///
/// For restores, steps left in progress are closed as errors and a final
/// error step carries the message. Store failures here are logged only.
pub(crate) async fn mark_failed(ctx: &BackupContext, kind: JobKind, id: DbId, message: &str) {
    let result = match kind {
        JobKind::Export => fail_export(ctx, id, message).await,
        JobKind::Restore => fail_restore(ctx, id, message).await,
    };
    if let Err(e) = result {
        tracing::error!(%kind, id, error = %e, "Failed to record job failure");
    }
}

async fn fail_export(
    ctx: &BackupContext,
    id: DbId,
    message: &str,
) -> Result<(), stockpile_db::StoreError> {
    let Some(mut export) = ctx.store.get_export(id).await? else {
        return Ok(());
    };
    if !export.status.can_transition_to(JobStatus::Failed) {
        return Ok(());
    }
    export.status = JobStatus::Failed;
    export.error_message = Some(message.to_string());
    export.completed_date = Some(Utc::now());
    ctx.store.update_export(&export).await?;
    Ok(())
}

async fn fail_restore(
    ctx: &BackupContext,
    id: DbId,
    message: &str,
) -> Result<(), stockpile_db::StoreError> {
    let Some(mut op) = ctx.store.get_restore_operation(id).await? else {
        return Ok(());
    };
    if !op.status.can_transition_to(JobStatus::Failed) {
        return Ok(());
    }

    let steps = StepRecorder::new(ctx.store.clone(), id);
    if op.status == JobStatus::Running {
        steps.close_open_steps(&format!("Aborted: {message}")).await?;
        steps
            .create_step(
                format!("{} Restore failed", StepResult::Error.icon()),
                StepResult::Error,
                message,
            )
            .await?;
    }

    op.status = JobStatus::Failed;
    op.error_message = Some(message.to_string());
    op.completed_date = Some(Utc::now());
    ctx.store.update_restore_operation(&op).await?;
    Ok(())
}
