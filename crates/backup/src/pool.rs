//! Bounded-concurrency execution of backup jobs.
//!
//! Jobs run on their own Tokio tasks, detached from the request that created
//! them. Exports and restores draw from separate semaphores so a long export
//! never starves restores and vice versa. A submitted job waits for a slot;
//! it is never dropped.
//!
//! The pool owns a [`CancellationToken`]. Cancelling it (directly or through
//! [`WorkerPool::shutdown`]) stops new submissions, fails queued jobs, and
//! lets running jobs fail at their next per-entity checkpoint.

use std::sync::Arc;
use std::time::Duration;

use stockpile_core::backup::JobStatus;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::Instrument;

use crate::error::BackupError;
use crate::export::run_export;
use crate::job::{mark_failed, Actor, BackupContext, JobKind, JobRequest};
use crate::restore::run_restore;

/// Default number of exports running at once.
pub const DEFAULT_MAX_CONCURRENT_EXPORTS: usize = 3;

/// Default number of restores running at once.
pub const DEFAULT_MAX_CONCURRENT_IMPORTS: usize = 1;

/// Reason recorded on jobs found running at startup.
pub const INTERRUPTED_BY_RESTART: &str = "interrupted by restart";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    pub max_concurrent_exports: usize,
    pub max_concurrent_imports: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_concurrent_exports: DEFAULT_MAX_CONCURRENT_EXPORTS,
            max_concurrent_imports: DEFAULT_MAX_CONCURRENT_IMPORTS,
        }
    }
}

impl PoolConfig {
    /// Read `MAX_CONCURRENT_EXPORTS` and `MAX_CONCURRENT_IMPORTS`.
    ///
    /// Missing or unparsable values fall back to the defaults; zero is
    /// raised to one.
    pub fn from_env() -> Self {
        fn limit(var: &str, default: usize) -> usize {
            std::env::var(var)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
                .max(1)
        }

        Self {
            max_concurrent_exports: limit("MAX_CONCURRENT_EXPORTS", DEFAULT_MAX_CONCURRENT_EXPORTS),
            max_concurrent_imports: limit("MAX_CONCURRENT_IMPORTS", DEFAULT_MAX_CONCURRENT_IMPORTS),
        }
    }

    fn limit(&self, kind: JobKind) -> usize {
        match kind {
            JobKind::Export => self.max_concurrent_exports,
            JobKind::Restore => self.max_concurrent_imports,
        }
        .max(1)
    }
}

struct PoolInner {
    ctx: BackupContext,
    config: PoolConfig,
    export_slots: Arc<Semaphore>,
    restore_slots: Arc<Semaphore>,
    cancel: CancellationToken,
    tracker: TaskTracker,
}

/// Handle to the job pool. Cheap to clone.
#[derive(Clone)]
pub struct WorkerPool {
    inner: Arc<PoolInner>,
}

impl WorkerPool {
    /// Create the pool. Jobs run until `cancel` fires.
    pub fn start(ctx: BackupContext, config: PoolConfig, cancel: CancellationToken) -> Self {
        tracing::info!(
            max_concurrent_exports = config.limit(JobKind::Export),
            max_concurrent_imports = config.limit(JobKind::Restore),
            "Backup worker pool started",
        );
        let export_slots = Arc::new(Semaphore::new(config.limit(JobKind::Export)));
        Self {
            inner: Arc::new(PoolInner {
                ctx: ctx.with_export_slots(export_slots.clone()),
                export_slots,
                restore_slots: Arc::new(Semaphore::new(config.limit(JobKind::Restore))),
                config,
                cancel,
                tracker: TaskTracker::new(),
            }),
        }
    }

    pub fn config(&self) -> PoolConfig {
        self.inner.config
    }

    /// Whether the pool still accepts jobs.
    pub fn is_accepting(&self) -> bool {
        !self.inner.cancel.is_cancelled() && !self.inner.tracker.is_closed()
    }

    /// Number of jobs of `kind` currently holding a slot.
    pub fn active(&self, kind: JobKind) -> usize {
        let slots = self.inner.slots(kind);
        self.inner.config.limit(kind) - slots.available_permits()
    }

    /// Queue a job. Returns immediately; the job runs when a slot frees up.
    pub fn submit(&self, job: JobRequest) -> Result<(), BackupError> {
        if !self.is_accepting() {
            return Err(BackupError::ShuttingDown);
        }
        tracing::debug!(kind = %job.kind, id = job.id, "Job queued");
        let inner = self.inner.clone();
        self.inner.tracker.spawn(async move { inner.run(job).await });
        Ok(())
    }

    /// Reconcile jobs left over from a previous process.
    ///
    /// Jobs found running are failed with [`INTERRUPTED_BY_RESTART`]; pending
    /// jobs are queued again. Returns the number of jobs requeued.
    pub async fn recover(&self) -> Result<usize, BackupError> {
        let ctx = &self.inner.ctx;
        let mut requeued = 0;

        let exports = ctx
            .store
            .list_exports_by_status(&[JobStatus::Running, JobStatus::Pending])
            .await?;
        for export in exports {
            if export.status == JobStatus::Running {
                tracing::warn!(export_id = export.id, "Export interrupted by restart");
                mark_failed(ctx, JobKind::Export, export.id, INTERRUPTED_BY_RESTART).await;
            } else {
                self.submit(JobRequest::export(export.id, Actor::system()))?;
                requeued += 1;
            }
        }

        let restores = ctx
            .store
            .list_restore_operations_by_status(&[JobStatus::Running, JobStatus::Pending])
            .await?;
        for op in restores {
            if op.status == JobStatus::Running {
                tracing::warn!(restore_id = op.id, "Restore interrupted by restart");
                mark_failed(ctx, JobKind::Restore, op.id, INTERRUPTED_BY_RESTART).await;
            } else {
                self.submit(JobRequest::restore(op.id, Actor::system()))?;
                requeued += 1;
            }
        }

        if requeued > 0 {
            tracing::info!(requeued, "Requeued pending backup jobs");
        }
        Ok(requeued)
    }

    /// True while any restore operation is pending or running.
    pub async fn has_running_restores(&self) -> Result<bool, BackupError> {
        let active = self
            .inner
            .ctx
            .store
            .list_restore_operations_by_status(&[JobStatus::Pending, JobStatus::Running])
            .await?;
        Ok(!active.is_empty())
    }

    /// Stop accepting jobs, signal cancellation, and wait up to `timeout` for
    /// every job task to finish. Returns `false` if the wait timed out.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        tracing::info!("Backup worker pool shutting down");
        self.inner.cancel.cancel();
        self.inner.tracker.close();
        match tokio::time::timeout(timeout, self.inner.tracker.wait()).await {
            Ok(()) => {
                tracing::info!("Backup worker pool stopped");
                true
            }
            Err(_) => {
                tracing::warn!(
                    still_running = self.inner.tracker.len(),
                    "Backup worker pool shutdown timed out"
                );
                false
            }
        }
    }
}

impl PoolInner {
    fn slots(&self, kind: JobKind) -> &Arc<Semaphore> {
        match kind {
            JobKind::Export => &self.export_slots,
            JobKind::Restore => &self.restore_slots,
        }
    }

    async fn run(self: Arc<Self>, job: JobRequest) {
        let slots = self.slots(job.kind).clone();
        let permit = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            permit = slots.acquire_owned() => permit.ok(),
        };
        let Some(permit) = permit else {
            tracing::info!(kind = %job.kind, id = job.id, "Queued job cancelled");
            mark_failed(&self.ctx, job.kind, job.id, "cancelled before start: worker pool shut down").await;
            return;
        };

        let span = tracing::info_span!(
            "backup_job",
            kind = %job.kind,
            id = job.id,
            tenant_id = %job.actor.tenant_id,
            user_id = %job.actor.user_id,
        );

        // The job body runs on its own task so a panic surfaces as a
        // JoinError here instead of tearing down the pool task.
        let ctx = self.ctx.clone();
        let cancel = self.cancel.child_token();
        let (kind, id) = (job.kind, job.id);
        let handle = tokio::spawn(
            async move {
                match kind {
                    JobKind::Export => run_export(&ctx, id, &cancel).await.map(|_| ()),
                    JobKind::Restore => run_restore(&ctx, id, &cancel).await.map(|_| ()),
                }
            }
            .instrument(span),
        );

        let outcome = match handle.await {
            Ok(result) => result,
            Err(join_err) if join_err.is_panic() => {
                Err(BackupError::Panicked(panic_message(join_err.into_panic())))
            }
            Err(join_err) => Err(BackupError::Cancelled(join_err.to_string())),
        };

        if let Err(e) = outcome {
            if e.leaves_record_untouched() {
                tracing::warn!(%kind, id, error = %e, "Job not run");
            } else {
                tracing::error!(%kind, id, error = %e, "Job failed");
                mark_failed(&self.ctx, kind, id, &e.to_string()).await;
            }
        }
        drop(permit);
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
