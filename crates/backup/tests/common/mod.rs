#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use stockpile_backup::bucket::{Bucket, MemoryBucket};
use stockpile_backup::xml::{encode_inventory, DocumentFile, InventoryDocument};
use stockpile_backup::{BackupContext, BackupService, PoolConfig, WorkerPool};
use stockpile_core::backup::{FileKind, RestoreStrategy};
use stockpile_core::types::DbId;
use stockpile_db::models::area::Area;
use stockpile_db::models::commodity::Commodity;
use stockpile_db::models::export::Export;
use stockpile_db::models::file::FileEntity;
use stockpile_db::models::location::Location;
use stockpile_db::models::restore_operation::{
    CreateRestoreOperation, RestoreOperation, RestoreOptions,
};
use stockpile_db::store::memory::MemoryJobStore;
use stockpile_db::store::{JobStore, RegistrySet};
use tokio_util::sync::CancellationToken;

/// Everything a test needs, all in memory.
pub struct Harness {
    pub ctx: BackupContext,
    pub bucket: Arc<MemoryBucket>,
    pub service: BackupService,
    pub cancel: CancellationToken,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(PoolConfig::default())
    }

    pub fn with_config(config: PoolConfig) -> Self {
        let bucket = Arc::new(MemoryBucket::new());
        let ctx = BackupContext::new(
            Arc::new(MemoryJobStore::new()),
            RegistrySet::in_memory(),
            bucket.clone(),
        );
        Self::from_parts(ctx, bucket, config)
    }

    /// Jobs go through `bucket`, which is expected to wrap `memory`; tests
    /// inspect and seed through `memory` directly.
    pub fn with_bucket(
        config: PoolConfig,
        memory: Arc<MemoryBucket>,
        bucket: Arc<dyn Bucket>,
    ) -> Self {
        let ctx = BackupContext::new(
            Arc::new(MemoryJobStore::new()),
            RegistrySet::in_memory(),
            bucket,
        );
        Self::from_parts(ctx, memory, config)
    }

    /// A harness sharing this one's bucket but with fresh registries and
    /// job records, i.e. another installation reading the same storage.
    pub fn sibling(&self) -> Self {
        let ctx = BackupContext::new(
            Arc::new(MemoryJobStore::new()),
            RegistrySet::in_memory(),
            self.bucket.clone(),
        );
        Self::from_parts(ctx, self.bucket.clone(), PoolConfig::default())
    }

    fn from_parts(ctx: BackupContext, bucket: Arc<MemoryBucket>, config: PoolConfig) -> Self {
        let cancel = CancellationToken::new();
        let pool = WorkerPool::start(ctx.clone(), config, cancel.clone());
        let service = BackupService::new(ctx.clone(), pool);
        Self {
            ctx,
            bucket,
            service,
            cancel,
        }
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.ctx.store
    }

    pub fn registries(&self) -> &RegistrySet {
        &self.ctx.registries
    }

    pub async fn locations(&self) -> Vec<Location> {
        self.registries().locations.list().await.unwrap()
    }

    pub async fn areas(&self) -> Vec<Area> {
        self.registries().areas.list().await.unwrap()
    }

    pub async fn commodities(&self) -> Vec<Commodity> {
        self.registries().commodities.list().await.unwrap()
    }

    pub async fn files(&self) -> Vec<FileEntity> {
        self.registries().files.list().await.unwrap()
    }

    /// Insert `doc`'s entities directly into the registries, writing
    /// attachment bytes to the bucket.
    pub async fn seed(&self, doc: &InventoryDocument) {
        let regs = self.registries();
        for l in &doc.locations {
            regs.locations.create(l).await.unwrap();
        }
        for a in &doc.areas {
            regs.areas.create(a).await.unwrap();
        }
        for c in &doc.commodities {
            regs.commodities.create(c).await.unwrap();
        }
        for f in &doc.files {
            if let Some(bytes) = f.bytes().unwrap() {
                self.bucket.write(&f.file.path, &bytes).await.unwrap();
            }
            regs.files.create(&f.file).await.unwrap();
        }
    }

    /// Store `doc` in the bucket under `key`.
    pub async fn put_document(&self, key: &str, doc: &InventoryDocument) {
        let bytes = encode_inventory(doc).unwrap();
        self.bucket.write(key, &bytes).await.unwrap();
    }

    /// Create a restore record from an uploaded document without queueing it.
    pub async fn pending_restore(
        &self,
        key: &str,
        strategy: RestoreStrategy,
        options: RestoreOptions,
    ) -> RestoreOperation {
        self.store()
            .create_restore_operation(&CreateRestoreOperation {
                export_id: None,
                source_file_path: Some(key.to_string()),
                description: Some("test restore".to_string()),
                strategy,
                options,
            })
            .await
            .unwrap()
    }

    pub async fn wait_for_export(&self, id: DbId) -> Export {
        wait_until(move || async move {
            let export = self.service.get_export(id).await.unwrap();
            export.status.is_terminal().then_some(export)
        })
        .await
    }

    pub async fn wait_for_restore(&self, id: DbId) -> RestoreOperation {
        wait_until(move || async move {
            let op = self.service.get_restore(id).await.unwrap();
            op.status.is_terminal().then_some(op)
        })
        .await
    }
}

/// Poll `check` until it yields a value, failing the test after 5 seconds.
pub async fn wait_until<T, F, Fut>(mut check: F) -> T
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Option<T>>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if let Some(value) = check().await {
            return value;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for job"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

pub fn options(include_file_data: bool, dry_run: bool) -> RestoreOptions {
    RestoreOptions {
        include_file_data,
        dry_run,
        backup_existing: false,
    }
}

pub fn location(id: &str, name: &str) -> Location {
    Location {
        id: id.to_string(),
        name: name.to_string(),
        address: String::new(),
    }
}

pub fn area(id: &str, name: &str, location_id: &str) -> Area {
    Area {
        id: id.to_string(),
        name: name.to_string(),
        location_id: location_id.to_string(),
    }
}

pub fn file(id: &str, commodity_id: &str, kind: FileKind, path: &str) -> FileEntity {
    FileEntity {
        id: id.to_string(),
        commodity_id: commodity_id.to_string(),
        kind,
        path: path.to_string(),
        original_path: format!("{id}.bin"),
        extension: ".bin".to_string(),
        mime_type: "application/octet-stream".to_string(),
    }
}

/// Two locations, two areas, one commodity with an image and a manual.
pub fn sample_inventory() -> InventoryDocument {
    let mut drill = Commodity::new("c1", "Drill", "a1");
    drill.tags = vec!["tools".to_string()];
    drill.original_price = 99.0;

    InventoryDocument {
        locations: vec![location("l1", "House"), location("l2", "Garage")],
        areas: vec![area("a1", "Kitchen", "l1"), area("a2", "Workbench", "l2")],
        commodities: vec![drill],
        files: vec![
            DocumentFile::with_bytes(
                file("f1", "c1", FileKind::Image, "files/c1/f1.bin"),
                b"png bytes",
            ),
            DocumentFile::with_bytes(
                file("f2", "c1", FileKind::Manual, "files/c1/f2.bin"),
                b"pdf bytes",
            ),
        ],
        ..InventoryDocument::default()
    }
}
