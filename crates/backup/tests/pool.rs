//! Integration tests for the worker pool: concurrency limits, shutdown,
//! restart recovery, and panics inside jobs.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use common::{location, options, wait_until, Harness};
use stockpile_backup::bucket::{Bucket, BucketError, MemoryBucket};
use stockpile_backup::xml::InventoryDocument;
use stockpile_backup::{Actor, BackupError, JobKind, PoolConfig};
use stockpile_core::backup::{ExportType, JobStatus, RestoreStrategy};
use stockpile_db::models::export::{CreateExport, Export};
use stockpile_db::models::restore_operation::{
    CreateRestoreOperation, RestoreOperation, RestoreOptions,
};
use tokio::sync::Semaphore;

const SOURCE: &str = "uploads/source.xml";

/// Which bucket calls wait for the gate.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Gate {
    Reads,
    ExportWrites,
}

/// Bucket whose gated calls block until the test opens the gate, recording
/// how many callers were waiting at once.
struct GatedBucket {
    inner: Arc<MemoryBucket>,
    gated: Gate,
    gate: Semaphore,
    active: AtomicUsize,
    max_active: AtomicUsize,
    panic_on_read: bool,
}

impl GatedBucket {
    fn new(inner: Arc<MemoryBucket>, gated: Gate) -> Self {
        Self {
            inner,
            gated,
            gate: Semaphore::new(0),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            panic_on_read: false,
        }
    }

    fn open(&self) {
        self.gate.add_permits(1);
    }

    fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    async fn pass(&self) {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        // Permits go back on drop, so one opening releases every caller.
        let _permit = self.gate.acquire().await.unwrap();
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Bucket for GatedBucket {
    async fn read(&self, key: &str) -> Result<Vec<u8>, BucketError> {
        if self.panic_on_read {
            panic!("disk on fire");
        }
        if self.gated == Gate::Reads {
            self.pass().await;
        }
        self.inner.read(key).await
    }

    async fn write(&self, key: &str, bytes: &[u8]) -> Result<(), BucketError> {
        if self.gated == Gate::ExportWrites && key.starts_with("exports/") {
            self.pass().await;
        }
        self.inner.write(key, bytes).await
    }

    async fn delete(&self, key: &str) -> Result<(), BucketError> {
        self.inner.delete(key).await
    }

    async fn exists(&self, key: &str) -> Result<bool, BucketError> {
        self.inner.exists(key).await
    }
}

fn gated(config: PoolConfig, gate: Gate) -> (Harness, Arc<GatedBucket>) {
    let memory = Arc::new(MemoryBucket::new());
    let gated = Arc::new(GatedBucket::new(memory.clone(), gate));
    (Harness::with_bucket(config, memory, gated.clone()), gated)
}

fn one_location() -> InventoryDocument {
    InventoryDocument {
        locations: vec![location("l1", "House")],
        ..InventoryDocument::default()
    }
}

async fn submit_restore(h: &Harness) -> Result<RestoreOperation, BackupError> {
    submit_restore_with(h, options(true, false)).await
}

async fn submit_restore_with(
    h: &Harness,
    options: RestoreOptions,
) -> Result<RestoreOperation, BackupError> {
    h.service
        .create_restore(
            &Actor::new("tenant-a", "user-1"),
            &CreateRestoreOperation {
                export_id: None,
                source_file_path: Some(SOURCE.to_string()),
                description: None,
                strategy: RestoreStrategy::MergeAdd,
                options,
            },
        )
        .await
}

async fn submit_export(h: &Harness) -> Export {
    h.service
        .create_export(
            &Actor::new("tenant-a", "user-1"),
            &CreateExport {
                export_type: ExportType::FullDatabase,
                description: "nightly".to_string(),
                include_file_data: false,
                selected_items: Vec::new(),
            },
        )
        .await
        .unwrap()
}

async fn running_exports(h: &Harness) -> usize {
    h.store()
        .list_exports_by_status(&[JobStatus::Running])
        .await
        .unwrap()
        .len()
}

// ---------------------------------------------------------------------------
// Test: restores never exceed the configured concurrency
// ---------------------------------------------------------------------------

#[tokio::test]
async fn restores_respect_concurrency_limit() {
    let config = PoolConfig {
        max_concurrent_exports: 3,
        max_concurrent_imports: 1,
    };
    let (h, bucket) = gated(config, Gate::Reads);
    h.put_document(SOURCE, &one_location()).await;

    let mut ids = Vec::new();
    for _ in 0..3 {
        ids.push(submit_restore(&h).await.unwrap().id);
    }

    let watched = &*bucket;
    wait_until(move || async move { (watched.active() == 1).then_some(()) }).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(bucket.active(), 1);
    assert_eq!(h.service.pool().active(JobKind::Restore), 1);
    assert!(h.service.has_running_restores().await.unwrap());

    bucket.open();
    for id in ids {
        let op = h.wait_for_restore(id).await;
        assert_eq!(op.status, JobStatus::Completed, "{:?}", op.error_message);
    }

    assert_eq!(bucket.max_active(), 1);
    assert!(!h.service.has_running_restores().await.unwrap());
    let pool = h.service.pool();
    wait_until(move || async move { (pool.active(JobKind::Restore) == 0).then_some(()) }).await;
}

// ---------------------------------------------------------------------------
// Test: exports never exceed the configured concurrency
// ---------------------------------------------------------------------------

#[tokio::test]
async fn exports_respect_concurrency_limit() {
    let config = PoolConfig {
        max_concurrent_exports: 2,
        max_concurrent_imports: 1,
    };
    let (h, bucket) = gated(config, Gate::ExportWrites);
    h.seed(&one_location()).await;

    let mut ids = Vec::new();
    for _ in 0..3 {
        ids.push(submit_export(&h).await.id);
    }

    let watched = &*bucket;
    wait_until(move || async move { (watched.active() == 2).then_some(()) }).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(bucket.active(), 2);
    assert_eq!(h.service.pool().active(JobKind::Export), 2);
    assert_eq!(running_exports(&h).await, 2);

    bucket.open();
    for id in ids {
        let export = h.wait_for_export(id).await;
        assert_eq!(export.status, JobStatus::Completed, "{:?}", export.error_message);
        assert_eq!(export.location_count, 1);
    }
    assert_eq!(bucket.max_active(), 2);
}

// ---------------------------------------------------------------------------
// Test: the automatic pre-restore backup waits for an export slot
// ---------------------------------------------------------------------------

#[tokio::test]
async fn backup_before_restore_counts_against_export_limit() {
    let config = PoolConfig {
        max_concurrent_exports: 1,
        max_concurrent_imports: 1,
    };
    let (h, bucket) = gated(config, Gate::ExportWrites);
    h.seed(&one_location()).await;
    h.put_document(
        SOURCE,
        &InventoryDocument {
            locations: vec![location("l2", "Garage")],
            ..InventoryDocument::default()
        },
    )
    .await;

    let user_export = submit_export(&h).await;
    let watched = &*bucket;
    wait_until(move || async move { (watched.active() == 1).then_some(()) }).await;

    let mut opts = options(false, false);
    opts.backup_existing = true;
    let op = submit_restore_with(&h, opts).await.unwrap();

    // The restore reaches its backup step and queues behind the user export.
    let service = &h.service;
    let id = op.id;
    wait_until(move || async move {
        let op = service.get_restore(id).await.unwrap();
        op.steps
            .iter()
            .any(|s| s.name == "Backup existing data")
            .then_some(())
    })
    .await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(running_exports(&h).await, 1);
    assert_eq!(h.service.pool().active(JobKind::Export), 1);
    assert_eq!(bucket.active(), 1);
    assert_eq!(h.service.list_exports().await.unwrap().len(), 1);

    bucket.open();
    let op = h.wait_for_restore(op.id).await;
    assert_eq!(op.status, JobStatus::Completed, "{:?}", op.error_message);
    assert_eq!(
        h.wait_for_export(user_export.id).await.status,
        JobStatus::Completed
    );

    let exports = h.service.list_exports().await.unwrap();
    assert_eq!(exports.len(), 2);
    assert!(exports.iter().all(|e| e.status == JobStatus::Completed));
    assert_eq!(bucket.max_active(), 1);
    assert_eq!(h.locations().await.len(), 2);
}

// ---------------------------------------------------------------------------
// Test: shutdown fails queued and in-flight jobs and rejects new ones
// ---------------------------------------------------------------------------

#[tokio::test]
async fn shutdown_fails_outstanding_jobs() {
    let (h, bucket) = gated(PoolConfig::default(), Gate::Reads);
    h.put_document(SOURCE, &one_location()).await;

    let running = submit_restore(&h).await.unwrap();
    let queued = submit_restore(&h).await.unwrap();
    let watched = &*bucket;
    wait_until(move || async move { (watched.active() == 1).then_some(()) }).await;

    h.cancel.cancel();
    bucket.open();
    assert!(h.service.pool().shutdown(Duration::from_secs(5)).await);

    let running = h.service.get_restore(running.id).await.unwrap();
    assert_eq!(running.status, JobStatus::Failed);
    assert!(running
        .error_message
        .as_deref()
        .unwrap()
        .contains("interrupted by shutdown"));
    assert!(running.steps.iter().any(|s| s.name == "❌ Restore failed"));

    let queued = h.service.get_restore(queued.id).await.unwrap();
    assert_eq!(queued.status, JobStatus::Failed);
    assert!(queued
        .error_message
        .as_deref()
        .unwrap()
        .starts_with("cancelled before start"));

    assert!(h.locations().await.is_empty());
    assert!(!h.service.pool().is_accepting());
    assert_matches!(submit_restore(&h).await, Err(BackupError::ShuttingDown));

    // The rejected job is not left pending.
    let all = h.service.list_restores().await.unwrap();
    assert_eq!(all.len(), 3);
    assert!(all.iter().all(|op| op.status == JobStatus::Failed));
}

// ---------------------------------------------------------------------------
// Test: startup recovery fails interrupted jobs and requeues pending ones
// ---------------------------------------------------------------------------

#[tokio::test]
async fn recover_reconciles_leftover_jobs() {
    let h = Harness::new();
    h.put_document(SOURCE, &one_location()).await;
    let store = h.store();

    let input = CreateExport {
        export_type: ExportType::FullDatabase,
        description: "left over".to_string(),
        include_file_data: false,
        selected_items: Vec::new(),
    };
    let mut interrupted = store.create_export(&input).await.unwrap();
    interrupted.status = JobStatus::Running;
    let interrupted = store.update_export(&interrupted).await.unwrap();
    let pending_export = store.create_export(&input).await.unwrap();
    let pending_restore = h
        .pending_restore(SOURCE, RestoreStrategy::MergeAdd, options(true, false))
        .await;

    assert_eq!(h.service.pool().recover().await.unwrap(), 2);

    let interrupted = h.service.get_export(interrupted.id).await.unwrap();
    assert_eq!(interrupted.status, JobStatus::Failed);
    assert_eq!(interrupted.error_message.as_deref(), Some("interrupted by restart"));

    let export = h.wait_for_export(pending_export.id).await;
    assert_eq!(export.status, JobStatus::Completed);
    let op = h.wait_for_restore(pending_restore.id).await;
    assert_eq!(op.status, JobStatus::Completed);
    assert_eq!(h.locations().await, vec![location("l1", "House")]);
}

// ---------------------------------------------------------------------------
// Test: a panicking job is failed and the pool keeps working
// ---------------------------------------------------------------------------

#[tokio::test]
async fn panicking_job_is_marked_failed() {
    let memory = Arc::new(MemoryBucket::new());
    let mut bucket = GatedBucket::new(memory.clone(), Gate::Reads);
    bucket.panic_on_read = true;
    let h = Harness::with_bucket(PoolConfig::default(), memory, Arc::new(bucket));
    h.put_document(SOURCE, &one_location()).await;

    let op = submit_restore(&h).await.unwrap();
    let op = h.wait_for_restore(op.id).await;

    assert_eq!(op.status, JobStatus::Failed);
    let message = op.error_message.unwrap();
    assert!(message.starts_with("Worker panicked"), "{message}");
    assert!(message.contains("disk on fire"), "{message}");
    assert!(h.service.pool().is_accepting());

    // The slot is released and the pool keeps taking jobs.
    let pool = h.service.pool();
    wait_until(move || async move { (pool.active(JobKind::Restore) == 0).then_some(()) }).await;
    let second = submit_restore(&h).await.unwrap();
    let second = h.wait_for_restore(second.id).await;
    assert_eq!(second.status, JobStatus::Failed);
}
