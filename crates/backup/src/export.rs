//! Export orchestrator: snapshot the registries into an XML document in the
//! bucket and record the outcome on the export.

use std::collections::HashSet;

use chrono::Utc;
use stockpile_core::backup::{EntityKind, ExportType, JobStatus, SelectedItem, EXPORTS_PREFIX};
use stockpile_core::stats::BackupStats;
use stockpile_core::types::DbId;
use stockpile_db::models::area::Area;
use stockpile_db::models::commodity::Commodity;
use stockpile_db::models::export::Export;
use stockpile_db::models::file::FileEntity;
use stockpile_db::models::location::Location;
use tokio_util::sync::CancellationToken;

use crate::error::BackupError;
use crate::job::{BackupContext, JobKind};
use crate::xml::{encode_inventory, DocumentFile, InventoryDocument};

/// Entities chosen for one export, before any attachment bytes are read.
#[derive(Debug, Default)]
struct Selection {
    locations: Vec<Location>,
    areas: Vec<Area>,
    commodities: Vec<Commodity>,
    files: Vec<FileEntity>,
}

impl Selection {
    fn push_location(&mut self, seen: &mut HashSet<String>, location: Location) {
        if seen.insert(format!("location:{}", location.id)) {
            self.locations.push(location);
        }
    }

    fn push_area(&mut self, seen: &mut HashSet<String>, area: Area) {
        if seen.insert(format!("area:{}", area.id)) {
            self.areas.push(area);
        }
    }

    fn push_commodity(&mut self, seen: &mut HashSet<String>, commodity: Commodity) {
        if seen.insert(format!("commodity:{}", commodity.id)) {
            self.commodities.push(commodity);
        }
    }

    /// Attach the files of every selected commodity.
    fn with_files_of_commodities(mut self, all_files: Vec<FileEntity>) -> Self {
        let ids: HashSet<&str> = self.commodities.iter().map(|c| c.id.as_str()).collect();
        let files = all_files
            .into_iter()
            .filter(|f| ids.contains(f.commodity_id.as_str()))
            .collect();
        self.files = files;
        self
    }
}

/// Expand explicit selections: a location brings its areas and their
/// commodities, an area brings its commodities. Unknown IDs are per-item
/// errors.
async fn select_items(
    ctx: &BackupContext,
    items: &[SelectedItem],
    stats: &mut BackupStats,
) -> Result<Selection, BackupError> {
    let regs = &ctx.registries;
    let all_areas = regs.areas.list().await?;
    let all_commodities = regs.commodities.list().await?;

    let mut selection = Selection::default();
    let mut seen = HashSet::new();

    for item in items {
        match item.kind {
            EntityKind::Location => {
                let Some(location) = regs.locations.get(&item.id).await? else {
                    stats.record_error(format!("Location {} not found", item.id));
                    continue;
                };
                for area in all_areas.iter().filter(|a| a.location_id == location.id) {
                    for c in all_commodities.iter().filter(|c| c.area_id == area.id) {
                        selection.push_commodity(&mut seen, c.clone());
                    }
                    selection.push_area(&mut seen, area.clone());
                }
                selection.push_location(&mut seen, location);
            }
            EntityKind::Area => {
                let Some(area) = regs.areas.get(&item.id).await? else {
                    stats.record_error(format!("Area {} not found", item.id));
                    continue;
                };
                for c in all_commodities.iter().filter(|c| c.area_id == area.id) {
                    selection.push_commodity(&mut seen, c.clone());
                }
                selection.push_area(&mut seen, area);
            }
            EntityKind::Commodity => match regs.commodities.get(&item.id).await? {
                Some(c) => selection.push_commodity(&mut seen, c),
                None => stats.record_error(format!("Commodity {} not found", item.id)),
            },
            other => stats.record_error(format!("{} {} cannot be selected", other.label(), item.id)),
        }
    }

    let files = regs.files.list().await?;
    Ok(selection.with_files_of_commodities(files))
}

async fn select(
    ctx: &BackupContext,
    export: &Export,
    stats: &mut BackupStats,
) -> Result<Selection, BackupError> {
    let regs = &ctx.registries;
    let selection = match export.export_type {
        ExportType::FullDatabase => Selection {
            locations: regs.locations.list().await?,
            areas: regs.areas.list().await?,
            commodities: regs.commodities.list().await?,
            files: regs.files.list().await?,
        },
        ExportType::Locations => Selection {
            locations: regs.locations.list().await?,
            ..Selection::default()
        },
        ExportType::Areas => Selection {
            areas: regs.areas.list().await?,
            ..Selection::default()
        },
        ExportType::Commodities => Selection {
            commodities: regs.commodities.list().await?,
            ..Selection::default()
        }
        .with_files_of_commodities(regs.files.list().await?),
        ExportType::SelectedItems => select_items(ctx, &export.selected_items, stats).await?,
    };
    Ok(selection)
}

fn check_cancelled(cancel: &CancellationToken) -> Result<(), BackupError> {
    if cancel.is_cancelled() {
        return Err(BackupError::Cancelled(
            "export interrupted by shutdown".to_string(),
        ));
    }
    Ok(())
}

/// Build the document for `export`, counting what goes into it.
///
/// A missing attachment blob is a per-item error; the file's metadata is
/// still written, without data.
async fn build_document(
    ctx: &BackupContext,
    export: &Export,
    cancel: &CancellationToken,
    stats: &mut BackupStats,
) -> Result<InventoryDocument, BackupError> {
    let selection = select(ctx, export, stats).await?;

    for _ in &selection.locations {
        check_cancelled(cancel)?;
        stats.record_entity(EntityKind::Location);
    }
    for _ in &selection.areas {
        check_cancelled(cancel)?;
        stats.record_entity(EntityKind::Area);
    }
    for _ in &selection.commodities {
        check_cancelled(cancel)?;
        stats.record_entity(EntityKind::Commodity);
    }

    let mut files = Vec::with_capacity(selection.files.len());
    for file in selection.files {
        if !export.include_file_data {
            stats.record_entity(file.kind.into());
            files.push(DocumentFile::without_data(file));
            continue;
        }
        match ctx.bucket.read(&file.path).await {
            Ok(bytes) => {
                stats.record_entity(file.kind.into());
                stats.add_binary(bytes.len());
                files.push(DocumentFile::with_bytes(file, &bytes));
            }
            Err(e) => {
                tracing::warn!(export_id = export.id, file_id = %file.id, error = %e, "Attachment not readable");
                stats.record_error(format!("{} {}: {e}", EntityKind::from(file.kind).label(), file.id));
                files.push(DocumentFile::without_data(file));
            }
        }
    }

    Ok(InventoryDocument {
        export_date: Some(Utc::now().to_rfc3339()),
        export_type: Some(export.export_type.to_string()),
        locations: selection.locations,
        areas: selection.areas,
        commodities: selection.commodities,
        files,
    })
}

/// Drive a pending export to completion.
///
/// Errors are job-fatal; the caller records them on the export.
pub async fn run_export(
    ctx: &BackupContext,
    export_id: DbId,
    cancel: &CancellationToken,
) -> Result<Export, BackupError> {
    let mut export = ctx
        .store
        .get_export(export_id)
        .await?
        .ok_or(BackupError::JobNotFound {
            kind: JobKind::Export,
            id: export_id,
        })?;
    if export.status != JobStatus::Pending {
        return Err(BackupError::NotRunnable {
            kind: JobKind::Export,
            id: export_id,
        });
    }

    export.status = JobStatus::Running;
    export.started_date = Some(Utc::now());
    let mut export = ctx.store.update_export(&export).await?;
    tracing::info!(export_id, export_type = %export.export_type, "Export started");

    let mut stats = BackupStats::default();
    let document = build_document(ctx, &export, cancel, &mut stats).await?;
    let bytes = encode_inventory(&document)?;

    let key = format!(
        "{EXPORTS_PREFIX}/export_{export_id}_{}.xml",
        Utc::now().format("%Y%m%dT%H%M%SZ")
    );
    ctx.bucket.write(&key, &bytes).await?;

    export.apply_stats(&stats);
    export.file_path = Some(key);
    export.file_size = i64::try_from(bytes.len()).unwrap_or(i64::MAX);
    export.status = JobStatus::Completed;
    export.completed_date = Some(Utc::now());
    let export = ctx.store.update_export(&export).await?;

    tracing::info!(
        export_id,
        file_size = export.file_size,
        error_count = export.error_count,
        "Export completed"
    );
    Ok(export)
}
