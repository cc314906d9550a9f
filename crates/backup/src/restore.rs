//! Restore orchestrator: read a backup document and apply it to the
//! registries under a conflict strategy, recording one step per decision.
//!
//! Order of work for one operation:
//!
//! 1. `Read backup file`: fetch and decode the whole document. Fatal.
//! 2. `Backup existing data`: optional automatic full export. Fatal.
//! 3. `Clear existing data`: full replace only.
//! 4. One `Process {category}` bracket per category in dependency order,
//!    with a step per entity inside it.
//!
//! Per-item failures (validation, missing parent, duplicate ID, rejected
//! write) become error steps and counters; the run continues.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use stockpile_core::backup::{EntityKind, ExportType, JobStatus, StepResult, FILES_PREFIX};
use stockpile_core::error::CoreError;
use stockpile_core::stats::BackupStats;
use stockpile_core::strategy::{clears_destination, resolve, Existence, RestoreAction};
use stockpile_core::types::DbId;
use stockpile_db::models::area::Area;
use stockpile_db::models::commodity::Commodity;
use stockpile_db::models::export::CreateExport;
use stockpile_db::models::file::FileEntity;
use stockpile_db::models::location::Location;
use stockpile_db::models::restore_operation::RestoreOperation;
use stockpile_db::store::{Entity, Registry, RegistrySet};
use stockpile_db::StoreError;
use tokio_util::sync::CancellationToken;

use crate::error::BackupError;
use crate::export::run_export;
use crate::job::{self, BackupContext, JobKind};
use crate::steps::StepRecorder;
use crate::xml::{decode_inventory, DocumentFile, InventoryDocument};

pub const STEP_READ: &str = "Read backup file";
pub const STEP_BACKUP: &str = "Backup existing data";
pub const STEP_CLEAR: &str = "Clear existing data";

/// Name of the bracket step for one category.
pub fn category_step(kind: EntityKind) -> String {
    format!("Process {}", kind.plural())
}

// ---------------------------------------------------------------------------
// Restorable entities
// ---------------------------------------------------------------------------

/// What the orchestrator needs to know about one entity type.
trait Restorable: Entity {
    fn registry(regs: &RegistrySet) -> &Arc<dyn Registry<Self>>;

    /// Name shown in the entity's step.
    fn display_name(&self) -> &str;

    /// The entity this one hangs off, if any.
    fn parent(&self) -> Option<(EntityKind, &str)>;

    fn validate(&self) -> Result<(), String>;
}

fn required(value: &str, field: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field} must not be empty"));
    }
    Ok(())
}

impl Restorable for Location {
    fn registry(regs: &RegistrySet) -> &Arc<dyn Registry<Self>> {
        &regs.locations
    }

    fn display_name(&self) -> &str {
        &self.name
    }

    fn parent(&self) -> Option<(EntityKind, &str)> {
        None
    }

    fn validate(&self) -> Result<(), String> {
        required(&self.name, "name")
    }
}

impl Restorable for Area {
    fn registry(regs: &RegistrySet) -> &Arc<dyn Registry<Self>> {
        &regs.areas
    }

    fn display_name(&self) -> &str {
        &self.name
    }

    fn parent(&self) -> Option<(EntityKind, &str)> {
        Some((EntityKind::Location, &self.location_id))
    }

    fn validate(&self) -> Result<(), String> {
        required(&self.name, "name")?;
        required(&self.location_id, "locationId")
    }
}

impl Restorable for Commodity {
    fn registry(regs: &RegistrySet) -> &Arc<dyn Registry<Self>> {
        &regs.commodities
    }

    fn display_name(&self) -> &str {
        &self.name
    }

    fn parent(&self) -> Option<(EntityKind, &str)> {
        Some((EntityKind::Area, &self.area_id))
    }

    fn validate(&self) -> Result<(), String> {
        required(&self.name, "name")?;
        required(&self.area_id, "areaId")?;
        if self.count < 1 {
            return Err(format!("count must be at least 1, got {}", self.count));
        }
        Ok(())
    }
}

impl Restorable for FileEntity {
    fn registry(regs: &RegistrySet) -> &Arc<dyn Registry<Self>> {
        &regs.files
    }

    fn display_name(&self) -> &str {
        if !self.original_path.is_empty() {
            &self.original_path
        } else if !self.path.is_empty() {
            &self.path
        } else {
            &self.id
        }
    }

    fn parent(&self) -> Option<(EntityKind, &str)> {
        Some((EntityKind::Commodity, &self.commodity_id))
    }

    fn validate(&self) -> Result<(), String> {
        required(&self.commodity_id, "commodity id")
    }
}

// ---------------------------------------------------------------------------
// Run state
// ---------------------------------------------------------------------------

/// Attachment bytes to store under a bucket key before the record is written.
struct Payload {
    key: String,
    bytes: Vec<u8>,
}

/// Counter snapshot used to summarise one category.
#[derive(Clone, Copy)]
struct Tally {
    created: i32,
    updated: i32,
    skipped: i32,
    errors: i32,
}

impl Tally {
    fn of(stats: &BackupStats) -> Self {
        Self {
            created: stats.created_count,
            updated: stats.updated_count,
            skipped: stats.skipped_count,
            errors: stats.error_count,
        }
    }

    fn since(self, earlier: Tally) -> Self {
        Self {
            created: self.created - earlier.created,
            updated: self.updated - earlier.updated,
            skipped: self.skipped - earlier.skipped,
            errors: self.errors - earlier.errors,
        }
    }

    fn summary(&self, dry_run: bool) -> String {
        let verbs = if dry_run {
            ["would create", "would update", "would skip"]
        } else {
            ["created", "updated", "skipped"]
        };
        format!(
            "{} {}, {} {}, {} {}, {} failed",
            self.created, verbs[0], self.updated, verbs[1], self.skipped, verbs[2], self.errors
        )
    }
}

struct RestoreRun<'a> {
    ctx: &'a BackupContext,
    cancel: &'a CancellationToken,
    op: RestoreOperation,
    steps: StepRecorder,
    stats: BackupStats,
    /// IDs met so far in the document, per collection.
    seen: HashMap<&'static str, HashSet<String>>,
    /// IDs restored, updated, skipped, or previewed in this run, per collection.
    handled: HashMap<&'static str, HashSet<String>>,
}

fn collection(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Location => Location::ENTITY,
        EntityKind::Area => Area::ENTITY,
        EntityKind::Commodity => Commodity::ENTITY,
        EntityKind::Image | EntityKind::Invoice | EntityKind::Manual => FileEntity::ENTITY,
    }
}

impl<'a> RestoreRun<'a> {
    fn dry_run(&self) -> bool {
        self.op.options.dry_run
    }

    fn check_cancelled(&self) -> Result<(), BackupError> {
        if self.cancel.is_cancelled() {
            return Err(BackupError::Cancelled(
                "restore interrupted by shutdown".to_string(),
            ));
        }
        Ok(())
    }

    // -- Source --------------------------------------------------------------

    async fn source_key(&self) -> Result<String, BackupError> {
        if let Some(path) = &self.op.source_file_path {
            return Ok(path.clone());
        }
        let Some(export_id) = self.op.export_id else {
            return Err(CoreError::Validation("restore has no source".to_string()).into());
        };
        let export = self.ctx.store.get_export(export_id).await?.ok_or_else(|| {
            CoreError::Validation(format!("export {export_id} no longer exists"))
        })?;
        export.file_path.ok_or_else(|| {
            CoreError::Validation(format!("export {export_id} has no backup file")).into()
        })
    }

    async fn read_document(&self) -> Result<InventoryDocument, BackupError> {
        self.steps
            .create_step(STEP_READ, StepResult::InProgress, "Reading backup file")
            .await?;
        let key = self.source_key().await?;
        let bytes = self.ctx.bucket.read(&key).await?;
        let doc = decode_inventory(&bytes)?;
        self.steps
            .update_step(
                STEP_READ,
                StepResult::Success,
                format!(
                    "Read {key}: {} locations, {} areas, {} commodities, {} files",
                    doc.locations.len(),
                    doc.areas.len(),
                    doc.commodities.len(),
                    doc.files.len()
                ),
            )
            .await?;
        Ok(doc)
    }

    // -- Preparation ---------------------------------------------------------

    async fn backup_existing(&self) -> Result<(), BackupError> {
        self.steps
            .create_step(STEP_BACKUP, StepResult::InProgress, "Exporting current data")
            .await?;
        // Counted against the export limit like any submitted export.
        let _slot = self.ctx.acquire_export_slot(self.cancel).await?;
        let export = self
            .ctx
            .store
            .create_export(&CreateExport {
                export_type: ExportType::FullDatabase,
                description: format!("Automatic backup before restore #{}", self.op.id),
                include_file_data: self.op.options.include_file_data,
                selected_items: Vec::new(),
            })
            .await?;

        match run_export(self.ctx, export.id, self.cancel).await {
            Ok(done) => {
                self.steps
                    .update_step(
                        STEP_BACKUP,
                        StepResult::Success,
                        format!(
                            "Saved as export #{} ({})",
                            done.id,
                            done.file_path.unwrap_or_default()
                        ),
                    )
                    .await?;
                Ok(())
            }
            Err(e) => {
                job::mark_failed(self.ctx, JobKind::Export, export.id, &e.to_string()).await;
                Err(e)
            }
        }
    }

    /// Delete every file, commodity, area, and location, children first.
    ///
    /// Attachment blobs are removed too, except those the incoming document
    /// still references by path.
    async fn clear_destination(&mut self, doc: &InventoryDocument) -> Result<(), BackupError> {
        self.steps
            .create_step(STEP_CLEAR, StepResult::InProgress, "Deleting existing data")
            .await?;
        let regs = self.ctx.registries.clone();
        let referenced: HashSet<&str> = doc.files.iter().map(|f| f.file.path.as_str()).collect();

        for file in regs.files.list().await? {
            if !file.path.is_empty() && !referenced.contains(file.path.as_str()) {
                if let Err(e) = self.ctx.bucket.delete(&file.path).await {
                    tracing::warn!(path = %file.path, error = %e, "Could not delete attachment blob");
                }
            }
            self.delete_one(regs.files.as_ref(), &file.id).await?;
        }
        for c in regs.commodities.list().await? {
            self.delete_one(regs.commodities.as_ref(), &c.id).await?;
        }
        for a in regs.areas.list().await? {
            self.delete_one(regs.areas.as_ref(), &a.id).await?;
        }
        for l in regs.locations.list().await? {
            self.delete_one(regs.locations.as_ref(), &l.id).await?;
        }

        self.steps
            .update_step(
                STEP_CLEAR,
                StepResult::Success,
                format!("Deleted {} entities", self.stats.deleted_count),
            )
            .await?;
        Ok(())
    }

    async fn delete_one<T: Entity>(
        &mut self,
        registry: &dyn Registry<T>,
        id: &str,
    ) -> Result<(), BackupError> {
        match registry.delete(id).await {
            Ok(()) => {
                self.stats.deleted_count += 1;
                Ok(())
            }
            // Already gone, e.g. removed with its parent.
            Err(StoreError::NotFound { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    // -- Categories ----------------------------------------------------------

    async fn process_category(
        &mut self,
        kind: EntityKind,
        doc: &InventoryDocument,
    ) -> Result<(), BackupError> {
        let step = category_step(kind);
        let total = match kind.file_kind() {
            Some(file_kind) => doc.files_of(file_kind).count(),
            None => match kind {
                EntityKind::Location => doc.locations.len(),
                EntityKind::Area => doc.areas.len(),
                _ => doc.commodities.len(),
            },
        };

        if kind.file_kind().is_some() && !self.op.options.include_file_data {
            self.steps
                .create_step(step, StepResult::Skipped, "File data excluded from this restore")
                .await?;
            return Ok(());
        }

        self.steps
            .create_step(
                step.as_str(),
                StepResult::InProgress,
                format!("Will process {total} {}", kind.plural()),
            )
            .await?;
        let before = Tally::of(&self.stats);

        match kind {
            EntityKind::Location => {
                for location in &doc.locations {
                    self.check_cancelled()?;
                    self.restore_one(kind, location.clone(), None).await?;
                }
            }
            EntityKind::Area => {
                for area in &doc.areas {
                    self.check_cancelled()?;
                    self.restore_one(kind, area.clone(), None).await?;
                }
            }
            EntityKind::Commodity => {
                for commodity in &doc.commodities {
                    self.check_cancelled()?;
                    self.restore_one(kind, commodity.clone(), None).await?;
                }
            }
            EntityKind::Image | EntityKind::Invoice | EntityKind::Manual => {
                let Some(file_kind) = kind.file_kind() else {
                    return Ok(());
                };
                for doc_file in doc.files_of(file_kind) {
                    self.check_cancelled()?;
                    self.restore_file(kind, doc_file).await?;
                }
            }
        }

        let tally = Tally::of(&self.stats).since(before);
        let result = if tally.errors > 0 {
            StepResult::Error
        } else {
            StepResult::Success
        };
        self.steps
            .update_step(&step, result, tally.summary(self.dry_run()))
            .await?;
        Ok(())
    }

    // -- Entities ------------------------------------------------------------

    async fn item_failed(&mut self, label: &str, reason: String) -> Result<(), BackupError> {
        tracing::warn!(restore_id = self.op.id, %label, %reason, "Restore item failed");
        self.stats.record_error(format!("{label}: {reason}"));
        self.steps
            .create_step(
                format!("{} {label}", StepResult::Error.icon()),
                StepResult::Error,
                reason,
            )
            .await?;
        Ok(())
    }

    async fn parent_exists(&self, kind: EntityKind, id: &str) -> Result<bool, BackupError> {
        if self
            .handled
            .get(collection(kind))
            .is_some_and(|ids| ids.contains(id))
        {
            return Ok(true);
        }
        let regs = &self.ctx.registries;
        let found = match kind {
            EntityKind::Location => regs.locations.get(id).await?.is_some(),
            EntityKind::Area => regs.areas.get(id).await?.is_some(),
            EntityKind::Commodity => regs.commodities.get(id).await?.is_some(),
            EntityKind::Image | EntityKind::Invoice | EntityKind::Manual => {
                regs.files.get(id).await?.is_some()
            }
        };
        Ok(found)
    }

    /// Reason the entity cannot be restored, if any.
    async fn precheck<T: Restorable>(&mut self, item: &T) -> Result<Option<String>, BackupError> {
        if !item.id().is_empty()
            && !self
                .seen
                .entry(T::ENTITY)
                .or_default()
                .insert(item.id().to_string())
        {
            return Ok(Some(format!("Duplicate {} id {} in backup", T::ENTITY, item.id())));
        }
        if let Err(reason) = item.validate() {
            return Ok(Some(reason));
        }
        if let Some((parent_kind, parent_id)) = item.parent() {
            if !self.parent_exists(parent_kind, parent_id).await? {
                return Ok(Some(format!("{} {parent_id} not found", parent_kind.label())));
            }
        }
        Ok(None)
    }

    async fn restore_one<T: Restorable>(
        &mut self,
        kind: EntityKind,
        item: T,
        payload: Option<Payload>,
    ) -> Result<(), BackupError> {
        let name = match item.display_name() {
            "" => item.id(),
            name => name,
        };
        let label = format!("{}: {name}", kind.label());

        if let Some(reason) = self.precheck(&item).await? {
            return self.item_failed(&label, reason).await;
        }

        let registry = T::registry(&self.ctx.registries).clone();
        let found = !item.id().is_empty() && registry.get(item.id()).await?.is_some();
        let action = resolve(self.op.strategy, Existence::from_found(found));

        let mut id = item.id().to_string();
        if action.mutates() && !self.dry_run() {
            if let Some(payload) = &payload {
                if let Err(e) = self.ctx.bucket.write(&payload.key, &payload.bytes).await {
                    return self
                        .item_failed(&label, format!("Failed to store file data: {e}"))
                        .await;
                }
            }
            let written = match action {
                RestoreAction::Update => registry.update(&item).await,
                _ => registry.create(&item).await,
            };
            match written {
                Ok(saved) => id = saved.id().to_string(),
                Err(e @ StoreError::Database(_)) => return Err(e.into()),
                Err(e) => return self.item_failed(&label, e.to_string()).await,
            }
        }

        if action.mutates() {
            if let Some(payload) = &payload {
                self.stats.add_binary(payload.bytes.len());
            }
        }
        if !id.is_empty() {
            self.handled.entry(T::ENTITY).or_default().insert(id);
        }
        self.stats.record_entity(kind);
        self.stats.record_action(action);

        let result = action.step_result();
        self.steps
            .create_step(
                format!("{} {label}", result.icon()),
                result,
                action.describe(self.dry_run()),
            )
            .await?;
        Ok(())
    }

    async fn restore_file(
        &mut self,
        kind: EntityKind,
        doc_file: &DocumentFile,
    ) -> Result<(), BackupError> {
        let mut file = doc_file.file.clone();
        let bytes = match doc_file.bytes() {
            Ok(bytes) => bytes,
            Err(e) => {
                let label = format!("{}: {}", kind.label(), file.display_name());
                return self
                    .item_failed(&label, format!("Invalid file data: {e}"))
                    .await;
            }
        };

        let payload = match bytes {
            Some(bytes) => {
                if file.id.is_empty() {
                    file.id = uuid::Uuid::new_v4().to_string();
                }
                if file.path.is_empty() {
                    file.path = format!(
                        "{FILES_PREFIX}/{}/{}{}",
                        file.commodity_id, file.id, file.extension
                    );
                }
                Some(Payload {
                    key: file.path.clone(),
                    bytes,
                })
            }
            None => None,
        };
        self.restore_one(kind, file, payload).await
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Drive a pending restore operation to completion.
///
/// Errors are job-fatal; the caller records them on the operation.
pub async fn run_restore(
    ctx: &BackupContext,
    restore_id: DbId,
    cancel: &CancellationToken,
) -> Result<RestoreOperation, BackupError> {
    let mut op = ctx
        .store
        .get_restore_operation(restore_id)
        .await?
        .ok_or(BackupError::JobNotFound {
            kind: JobKind::Restore,
            id: restore_id,
        })?;
    if op.status != JobStatus::Pending {
        return Err(BackupError::NotRunnable {
            kind: JobKind::Restore,
            id: restore_id,
        });
    }

    op.status = JobStatus::Running;
    op.started_date = Some(Utc::now());
    let op = ctx.store.update_restore_operation(&op).await?;
    tracing::info!(
        restore_id,
        strategy = %op.strategy,
        dry_run = op.options.dry_run,
        "Restore started"
    );

    let mut run = RestoreRun {
        ctx,
        cancel,
        steps: StepRecorder::new(ctx.store.clone(), restore_id),
        op,
        stats: BackupStats::default(),
        seen: HashMap::new(),
        handled: HashMap::new(),
    };

    let doc = run.read_document().await?;

    if run.op.options.backup_existing && !run.dry_run() {
        run.check_cancelled()?;
        run.backup_existing().await?;
    }
    if clears_destination(run.op.strategy) && !run.dry_run() {
        run.check_cancelled()?;
        run.clear_destination(&doc).await?;
    }

    for kind in EntityKind::PROCESSING_ORDER {
        run.process_category(kind, &doc).await?;
    }

    let summary = Tally::of(&run.stats).summary(run.dry_run());
    let summary = if run.dry_run() {
        format!("Dry run, nothing was changed: {summary}")
    } else {
        summary
    };
    run.steps
        .create_step(
            format!("{} Restore completed", StepResult::Success.icon()),
            StepResult::Success,
            summary,
        )
        .await?;

    let mut op = run.op;
    op.apply_stats(&run.stats);
    op.status = JobStatus::Completed;
    op.completed_date = Some(Utc::now());
    let op = ctx.store.update_restore_operation(&op).await?;

    tracing::info!(
        restore_id,
        created = op.created_count,
        updated = op.updated_count,
        skipped = op.skipped_count,
        deleted = op.deleted_count,
        errors = op.error_count,
        "Restore completed"
    );
    Ok(op)
}

