//! In-memory adapter for the store and registry traits.
//!
//! Used by the test suites and by the API binary when no `DATABASE_URL` is
//! configured. Semantics match the Postgres adapter: IDs and creation dates
//! are assigned on create, updates of missing rows fail, deletes cascade.

use async_trait::async_trait;
use chrono::Utc;
use indexmap::IndexMap;
use stockpile_core::backup::JobStatus;
use stockpile_core::types::DbId;
use tokio::sync::RwLock;

use super::{new_entity_id, Entity, JobStore, Registry};
use crate::error::{StoreError, StoreResult};
use crate::models::export::{CreateExport, Export};
use crate::models::restore_operation::{CreateRestoreOperation, RestoreOperation};
use crate::models::restore_step::{CreateRestoreStep, RestoreStep};

// ---------------------------------------------------------------------------
// Job store
// ---------------------------------------------------------------------------

#[derive(Default)]
struct JobTables {
    next_id: DbId,
    exports: IndexMap<DbId, Export>,
    restores: IndexMap<DbId, RestoreOperation>,
    steps: Vec<RestoreStep>,
}

impl JobTables {
    fn next_id(&mut self) -> DbId {
        self.next_id += 1;
        self.next_id
    }

    fn drop_restore(&mut self, id: DbId) -> bool {
        let removed = self.restores.shift_remove(&id).is_some();
        self.steps.retain(|s| s.restore_operation_id != id);
        removed
    }
}

/// Job store holding every record in process memory.
#[derive(Default)]
pub struct MemoryJobStore {
    tables: RwLock<JobTables>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first<T>(rows: impl DoubleEndedIterator<Item = T>) -> Vec<T> {
    rows.rev().collect()
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create_export(&self, input: &CreateExport) -> StoreResult<Export> {
        let mut tables = self.tables.write().await;
        let id = tables.next_id();
        let export = Export {
            id,
            export_type: input.export_type,
            description: input.description.clone(),
            status: JobStatus::Pending,
            include_file_data: input.include_file_data,
            selected_items: input.selected_items.clone(),
            file_path: None,
            file_size: 0,
            location_count: 0,
            area_count: 0,
            commodity_count: 0,
            image_count: 0,
            invoice_count: 0,
            manual_count: 0,
            binary_data_size: 0,
            error_count: 0,
            error_message: None,
            created_date: Utc::now(),
            started_date: None,
            completed_date: None,
        };
        tables.exports.insert(id, export.clone());
        Ok(export)
    }

    async fn get_export(&self, id: DbId) -> StoreResult<Option<Export>> {
        Ok(self.tables.read().await.exports.get(&id).cloned())
    }

    async fn list_exports(&self) -> StoreResult<Vec<Export>> {
        Ok(newest_first(self.tables.read().await.exports.values().cloned()))
    }

    async fn list_exports_by_status(&self, statuses: &[JobStatus]) -> StoreResult<Vec<Export>> {
        Ok(self
            .tables
            .read()
            .await
            .exports
            .values()
            .filter(|e| statuses.contains(&e.status))
            .cloned()
            .collect())
    }

    async fn update_export(&self, export: &Export) -> StoreResult<Export> {
        let mut tables = self.tables.write().await;
        let row = tables
            .exports
            .get_mut(&export.id)
            .ok_or_else(|| StoreError::not_found("Export", export.id))?;
        // Immutable columns keep their stored values.
        let mut updated = export.clone();
        updated.export_type = row.export_type;
        updated.include_file_data = row.include_file_data;
        updated.selected_items = row.selected_items.clone();
        updated.created_date = row.created_date;
        *row = updated.clone();
        Ok(updated)
    }

    async fn delete_export(&self, id: DbId) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let Some(export) = tables.exports.get(&id) else {
            return Err(StoreError::not_found("Export", id));
        };
        let busy = export.status == JobStatus::Running
            || tables
                .restores
                .values()
                .any(|r| r.export_id == Some(id) && r.status == JobStatus::Running);
        if busy {
            return Err(StoreError::Conflict(format!(
                "export {id} or one of its restores is running"
            )));
        }
        tables.exports.shift_remove(&id);
        let owned: Vec<DbId> = tables
            .restores
            .values()
            .filter(|r| r.export_id == Some(id))
            .map(|r| r.id)
            .collect();
        for restore_id in owned {
            tables.drop_restore(restore_id);
        }
        Ok(())
    }

    async fn create_restore_operation(
        &self,
        input: &CreateRestoreOperation,
    ) -> StoreResult<RestoreOperation> {
        let mut tables = self.tables.write().await;
        if let Some(export_id) = input.export_id {
            if !tables.exports.contains_key(&export_id) {
                return Err(StoreError::Validation(format!(
                    "export {export_id} does not exist"
                )));
            }
        }
        let id = tables.next_id();
        let op = RestoreOperation {
            id,
            export_id: input.export_id,
            source_file_path: input.source_file_path.clone(),
            description: input.description.clone().unwrap_or_default(),
            status: JobStatus::Pending,
            strategy: input.strategy,
            options: input.options,
            location_count: 0,
            area_count: 0,
            commodity_count: 0,
            image_count: 0,
            invoice_count: 0,
            manual_count: 0,
            binary_data_size: 0,
            created_count: 0,
            updated_count: 0,
            skipped_count: 0,
            deleted_count: 0,
            error_count: 0,
            error_message: None,
            created_date: Utc::now(),
            started_date: None,
            completed_date: None,
            steps: Vec::new(),
        };
        tables.restores.insert(id, op.clone());
        Ok(op)
    }

    async fn get_restore_operation(&self, id: DbId) -> StoreResult<Option<RestoreOperation>> {
        Ok(self.tables.read().await.restores.get(&id).cloned())
    }

    async fn list_restore_operations(&self) -> StoreResult<Vec<RestoreOperation>> {
        Ok(newest_first(self.tables.read().await.restores.values().cloned()))
    }

    async fn list_restore_operations_by_export(
        &self,
        export_id: DbId,
    ) -> StoreResult<Vec<RestoreOperation>> {
        Ok(newest_first(
            self.tables
                .read()
                .await
                .restores
                .values()
                .filter(|r| r.export_id == Some(export_id))
                .cloned(),
        ))
    }

    async fn list_restore_operations_by_status(
        &self,
        statuses: &[JobStatus],
    ) -> StoreResult<Vec<RestoreOperation>> {
        Ok(self
            .tables
            .read()
            .await
            .restores
            .values()
            .filter(|r| statuses.contains(&r.status))
            .cloned()
            .collect())
    }

    async fn update_restore_operation(
        &self,
        op: &RestoreOperation,
    ) -> StoreResult<RestoreOperation> {
        let mut tables = self.tables.write().await;
        let row = tables
            .restores
            .get_mut(&op.id)
            .ok_or_else(|| StoreError::not_found("RestoreOperation", op.id))?;
        let mut updated = op.clone();
        updated.export_id = row.export_id;
        updated.source_file_path = row.source_file_path.clone();
        updated.strategy = row.strategy;
        updated.options = row.options;
        updated.created_date = row.created_date;
        updated.steps = Vec::new();
        *row = updated.clone();
        Ok(updated)
    }

    async fn delete_restore_operation(&self, id: DbId) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        match tables.restores.get(&id) {
            None => Err(StoreError::not_found("RestoreOperation", id)),
            Some(op) if op.status == JobStatus::Running => Err(StoreError::Conflict(format!(
                "restore operation {id} is running"
            ))),
            Some(_) => {
                tables.drop_restore(id);
                Ok(())
            }
        }
    }

    async fn create_restore_step(&self, input: &CreateRestoreStep) -> StoreResult<RestoreStep> {
        let mut tables = self.tables.write().await;
        if !tables.restores.contains_key(&input.restore_operation_id) {
            return Err(StoreError::Validation(format!(
                "restore operation {} does not exist",
                input.restore_operation_id
            )));
        }
        let id = tables.next_id();
        let now = Utc::now();
        let step = RestoreStep {
            id,
            restore_operation_id: input.restore_operation_id,
            name: input.name.clone(),
            result: input.result,
            reason: input.reason.clone(),
            created_date: now,
            updated_date: now,
        };
        tables.steps.push(step.clone());
        Ok(step)
    }

    async fn update_restore_step(&self, step: &RestoreStep) -> StoreResult<RestoreStep> {
        let mut tables = self.tables.write().await;
        let row = tables
            .steps
            .iter_mut()
            .find(|s| s.id == step.id)
            .ok_or_else(|| StoreError::not_found("RestoreStep", step.id))?;
        row.result = step.result;
        row.reason = step.reason.clone();
        row.updated_date = Utc::now();
        Ok(row.clone())
    }

    async fn list_steps_by_restore_operation(
        &self,
        restore_operation_id: DbId,
    ) -> StoreResult<Vec<RestoreStep>> {
        Ok(self
            .tables
            .read()
            .await
            .steps
            .iter()
            .filter(|s| s.restore_operation_id == restore_operation_id)
            .cloned()
            .collect())
    }

    async fn list_steps_by_export(&self, export_id: DbId) -> StoreResult<Vec<RestoreStep>> {
        let tables = self.tables.read().await;
        let mut steps: Vec<RestoreStep> = tables
            .steps
            .iter()
            .filter(|s| {
                tables
                    .restores
                    .get(&s.restore_operation_id)
                    .is_some_and(|r| r.export_id == Some(export_id))
            })
            .cloned()
            .collect();
        steps.sort_by_key(|s| s.restore_operation_id);
        Ok(steps)
    }
}

// ---------------------------------------------------------------------------
// Registries
// ---------------------------------------------------------------------------

/// One inventory collection in insertion order.
pub struct MemoryRegistry<T> {
    items: RwLock<IndexMap<String, T>>,
}

impl<T> Default for MemoryRegistry<T> {
    fn default() -> Self {
        Self {
            items: RwLock::new(IndexMap::new()),
        }
    }
}

impl<T: Entity> MemoryRegistry<T> {
    /// A registry pre-filled with `items`.
    pub fn with_items(items: impl IntoIterator<Item = T>) -> Self {
        let map = items
            .into_iter()
            .map(|item| (item.id().to_string(), item))
            .collect();
        Self {
            items: RwLock::new(map),
        }
    }
}

#[async_trait]
impl<T: Entity> Registry<T> for MemoryRegistry<T> {
    async fn create(&self, item: &T) -> StoreResult<T> {
        let mut items = self.items.write().await;
        let mut item = item.clone();
        if item.id().is_empty() {
            item.set_id(new_entity_id());
        }
        if items.contains_key(item.id()) {
            return Err(StoreError::Conflict(format!(
                "{} with id {} already exists",
                T::ENTITY,
                item.id()
            )));
        }
        items.insert(item.id().to_string(), item.clone());
        Ok(item)
    }

    async fn get(&self, id: &str) -> StoreResult<Option<T>> {
        Ok(self.items.read().await.get(id).cloned())
    }

    async fn list(&self) -> StoreResult<Vec<T>> {
        Ok(self.items.read().await.values().cloned().collect())
    }

    async fn update(&self, item: &T) -> StoreResult<T> {
        let mut items = self.items.write().await;
        let row = items
            .get_mut(item.id())
            .ok_or_else(|| StoreError::not_found(T::ENTITY, item.id()))?;
        *row = item.clone();
        Ok(item.clone())
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        match self.items.write().await.shift_remove(id) {
            Some(_) => Ok(()),
            None => Err(StoreError::not_found(T::ENTITY, id)),
        }
    }
}
