//! Contract tests for the in-memory job store and registries.

use assert_matches::assert_matches;
use stockpile_core::backup::{ExportType, JobStatus, RestoreStrategy, StepResult};
use stockpile_db::models::export::CreateExport;
use stockpile_db::models::location::Location;
use stockpile_db::models::restore_operation::{CreateRestoreOperation, RestoreOptions};
use stockpile_db::models::restore_step::CreateRestoreStep;
use stockpile_db::store::memory::{MemoryJobStore, MemoryRegistry};
use stockpile_db::store::{JobStore, Registry};
use stockpile_db::StoreError;

fn export_input() -> CreateExport {
    CreateExport {
        export_type: ExportType::FullDatabase,
        description: "nightly".to_string(),
        include_file_data: false,
        selected_items: Vec::new(),
    }
}

fn restore_input(export_id: Option<i64>) -> CreateRestoreOperation {
    CreateRestoreOperation {
        export_id,
        source_file_path: export_id.is_none().then(|| "uploads/x.xml".to_string()),
        description: None,
        strategy: RestoreStrategy::MergeAdd,
        options: RestoreOptions::default(),
    }
}

fn step(restore_operation_id: i64, name: &str) -> CreateRestoreStep {
    CreateRestoreStep {
        restore_operation_id,
        name: name.to_string(),
        result: StepResult::InProgress,
        reason: String::new(),
    }
}

fn location(id: &str, name: &str) -> Location {
    Location {
        id: id.to_string(),
        name: name.to_string(),
        address: String::new(),
    }
}

// ---------------------------------------------------------------------------
// Test: create assigns IDs and defaults
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_export_assigns_id_and_pending_status() {
    let store = MemoryJobStore::new();

    let first = store.create_export(&export_input()).await.unwrap();
    let second = store.create_export(&export_input()).await.unwrap();

    assert_ne!(first.id, second.id);
    assert_eq!(first.status, JobStatus::Pending);
    assert!(first.file_path.is_none());
    assert!(first.started_date.is_none());

    // Newest first.
    let ids: Vec<i64> = store
        .list_exports()
        .await
        .unwrap()
        .iter()
        .map(|e| e.id)
        .collect();
    assert_eq!(ids, [second.id, first.id]);
}

// ---------------------------------------------------------------------------
// Test: updates keep immutable columns and require the row
// ---------------------------------------------------------------------------

#[tokio::test]
async fn update_export_keeps_immutable_columns() {
    let store = MemoryJobStore::new();
    let export = store.create_export(&export_input()).await.unwrap();

    let mut changed = export.clone();
    changed.status = JobStatus::Running;
    changed.export_type = ExportType::Areas;
    let saved = store.update_export(&changed).await.unwrap();

    assert_eq!(saved.status, JobStatus::Running);
    assert_eq!(saved.export_type, ExportType::FullDatabase);

    store.delete_export(export.id).await.unwrap();
    assert_matches!(
        store.update_export(&changed).await,
        Err(StoreError::NotFound { .. })
    );
}

// ---------------------------------------------------------------------------
// Test: status filters
// ---------------------------------------------------------------------------

#[tokio::test]
async fn lists_by_status() {
    let store = MemoryJobStore::new();
    let export = store.create_export(&export_input()).await.unwrap();
    let op = store.create_restore_operation(&restore_input(None)).await.unwrap();

    let mut running = op.clone();
    running.status = JobStatus::Running;
    store.update_restore_operation(&running).await.unwrap();

    let pending = store
        .list_exports_by_status(&[JobStatus::Pending])
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, export.id);

    assert!(store
        .list_restore_operations_by_status(&[JobStatus::Pending])
        .await
        .unwrap()
        .is_empty());
    assert_eq!(
        store
            .list_restore_operations_by_status(&[JobStatus::Running, JobStatus::Pending])
            .await
            .unwrap()
            .len(),
        1
    );
}

// ---------------------------------------------------------------------------
// Test: deletes cascade from export to restores to steps
// ---------------------------------------------------------------------------

#[tokio::test]
async fn delete_export_cascades() {
    let store = MemoryJobStore::new();
    let export = store.create_export(&export_input()).await.unwrap();
    let op = store
        .create_restore_operation(&restore_input(Some(export.id)))
        .await
        .unwrap();
    store.create_restore_step(&step(op.id, "Read backup file")).await.unwrap();

    assert_eq!(store.list_steps_by_export(export.id).await.unwrap().len(), 1);

    store.delete_export(export.id).await.unwrap();

    assert!(store.get_restore_operation(op.id).await.unwrap().is_none());
    assert!(store
        .list_steps_by_restore_operation(op.id)
        .await
        .unwrap()
        .is_empty());
    assert_matches!(
        store.delete_export(export.id).await,
        Err(StoreError::NotFound { .. })
    );
}

// ---------------------------------------------------------------------------
// Test: running jobs cannot be deleted
// ---------------------------------------------------------------------------

#[tokio::test]
async fn running_jobs_are_not_deleted() {
    let store = MemoryJobStore::new();
    let export = store.create_export(&export_input()).await.unwrap();
    let op = store
        .create_restore_operation(&restore_input(Some(export.id)))
        .await
        .unwrap();

    let mut running = op.clone();
    running.status = JobStatus::Running;
    store.update_restore_operation(&running).await.unwrap();

    assert_matches!(
        store.delete_restore_operation(op.id).await,
        Err(StoreError::Conflict(_))
    );
    assert_matches!(
        store.delete_export(export.id).await,
        Err(StoreError::Conflict(_))
    );
    assert!(store.get_restore_operation(op.id).await.unwrap().is_some());
    assert!(store.get_export(export.id).await.unwrap().is_some());

    running.status = JobStatus::Completed;
    store.update_restore_operation(&running).await.unwrap();
    store.delete_restore_operation(op.id).await.unwrap();
    assert_matches!(
        store.delete_restore_operation(op.id).await,
        Err(StoreError::NotFound { .. })
    );
}

// ---------------------------------------------------------------------------
// Test: references to missing parents are rejected
// ---------------------------------------------------------------------------

#[tokio::test]
async fn dangling_references_are_rejected() {
    let store = MemoryJobStore::new();

    assert_matches!(
        store.create_restore_operation(&restore_input(Some(77))).await,
        Err(StoreError::Validation(_))
    );
    assert_matches!(
        store.create_restore_step(&step(77, "orphan")).await,
        Err(StoreError::Validation(_))
    );
}

// ---------------------------------------------------------------------------
// Test: steps keep timeline order and update in place
// ---------------------------------------------------------------------------

#[tokio::test]
async fn steps_update_in_place() {
    let store = MemoryJobStore::new();
    let op = store.create_restore_operation(&restore_input(None)).await.unwrap();

    let first = store.create_restore_step(&step(op.id, "one")).await.unwrap();
    store.create_restore_step(&step(op.id, "two")).await.unwrap();

    let mut done = first.clone();
    done.result = StepResult::Success;
    done.reason = "ok".to_string();
    done.name = "renamed".to_string();
    store.update_restore_step(&done).await.unwrap();

    let steps = store.list_steps_by_restore_operation(op.id).await.unwrap();
    let names: Vec<&str> = steps.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, ["one", "two"]);
    assert_eq!(steps[0].result, StepResult::Success);
    assert_eq!(steps[0].reason, "ok");
    assert!(steps[0].updated_date >= steps[0].created_date);
}

// ---------------------------------------------------------------------------
// Test: registry CRUD
// ---------------------------------------------------------------------------

#[tokio::test]
async fn registry_create_get_update_delete() {
    let registry = MemoryRegistry::<Location>::default();

    let created = registry.create(&location("l1", "House")).await.unwrap();
    assert_eq!(created.id, "l1");
    assert_matches!(
        registry.create(&location("l1", "Again")).await,
        Err(StoreError::Conflict(_))
    );

    registry.update(&location("l1", "Home")).await.unwrap();
    assert_eq!(registry.get("l1").await.unwrap().unwrap().name, "Home");
    assert_matches!(
        registry.update(&location("l2", "Nowhere")).await,
        Err(StoreError::NotFound { .. })
    );

    registry.delete("l1").await.unwrap();
    assert!(registry.get("l1").await.unwrap().is_none());
    assert_matches!(registry.delete("l1").await, Err(StoreError::NotFound { .. }));
}

#[tokio::test]
async fn registry_assigns_ids_to_anonymous_entities() {
    let registry = MemoryRegistry::with_items([location("l1", "House")]);

    let created = registry.create(&location("", "Shed")).await.unwrap();

    assert_eq!(created.id.len(), 36);
    let names: Vec<String> = registry
        .list()
        .await
        .unwrap()
        .into_iter()
        .map(|l| l.name)
        .collect();
    assert_eq!(names, ["House", "Shed"]);
}
