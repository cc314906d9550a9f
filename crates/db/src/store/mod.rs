//! Collaborator contracts consumed by the backup subsystem.
//!
//! [`JobStore`] persists exports, restore operations, and their steps.
//! [`Registry`] is the narrow Create/Get/List/Update/Delete contract over one
//! inventory collection. Both are injected; nothing here is global.
//!
//! Two adapters ship with the crate: [`postgres::PgStore`] over the
//! repositories, and [`memory`] for tests and database-less runs.

pub mod memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use stockpile_core::backup::JobStatus;
use stockpile_core::types::DbId;

use crate::error::StoreResult;
use crate::models::area::Area;
use crate::models::commodity::Commodity;
use crate::models::export::{CreateExport, Export};
use crate::models::file::FileEntity;
use crate::models::location::Location;
use crate::models::restore_operation::{CreateRestoreOperation, RestoreOperation};
use crate::models::restore_step::{CreateRestoreStep, RestoreStep};
use crate::DbPool;

// ---------------------------------------------------------------------------
// Job store
// ---------------------------------------------------------------------------

/// Persistence for backup job records. Pure data access.
///
/// `create_*` assigns the ID and creation date. `update_*` requires the
/// record to exist and never resurrects a deleted one.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn create_export(&self, input: &CreateExport) -> StoreResult<Export>;
    async fn get_export(&self, id: DbId) -> StoreResult<Option<Export>>;
    async fn list_exports(&self) -> StoreResult<Vec<Export>>;
    async fn list_exports_by_status(&self, statuses: &[JobStatus]) -> StoreResult<Vec<Export>>;
    async fn update_export(&self, export: &Export) -> StoreResult<Export>;
    /// Hard delete. Restore operations of the export go with it.
    ///
    /// Fails with a conflict while the export or one of its restores is
    /// running; the check and the delete are one atomic step.
    async fn delete_export(&self, id: DbId) -> StoreResult<()>;

    async fn create_restore_operation(
        &self,
        input: &CreateRestoreOperation,
    ) -> StoreResult<RestoreOperation>;
    async fn get_restore_operation(&self, id: DbId) -> StoreResult<Option<RestoreOperation>>;
    async fn list_restore_operations(&self) -> StoreResult<Vec<RestoreOperation>>;
    async fn list_restore_operations_by_export(
        &self,
        export_id: DbId,
    ) -> StoreResult<Vec<RestoreOperation>>;
    async fn list_restore_operations_by_status(
        &self,
        statuses: &[JobStatus],
    ) -> StoreResult<Vec<RestoreOperation>>;
    async fn update_restore_operation(&self, op: &RestoreOperation)
        -> StoreResult<RestoreOperation>;
    /// Hard delete, cascading to the operation's steps. Fails with a
    /// conflict while the operation is running; the check and the delete
    /// are one atomic step.
    async fn delete_restore_operation(&self, id: DbId) -> StoreResult<()>;

    async fn create_restore_step(&self, input: &CreateRestoreStep) -> StoreResult<RestoreStep>;
    async fn update_restore_step(&self, step: &RestoreStep) -> StoreResult<RestoreStep>;
    /// Steps of one operation in timeline order.
    async fn list_steps_by_restore_operation(
        &self,
        restore_operation_id: DbId,
    ) -> StoreResult<Vec<RestoreStep>>;
    /// Steps of every operation restored from one export.
    async fn list_steps_by_export(&self, export_id: DbId) -> StoreResult<Vec<RestoreStep>>;
}

// ---------------------------------------------------------------------------
// Entity registries
// ---------------------------------------------------------------------------

/// An inventory record addressable by its opaque string ID.
pub trait Entity: Clone + Send + Sync + 'static {
    /// Entity name used in error messages.
    const ENTITY: &'static str;

    fn id(&self) -> &str;
    fn set_id(&mut self, id: String);
}

impl Entity for Location {
    const ENTITY: &'static str = "Location";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}

impl Entity for Area {
    const ENTITY: &'static str = "Area";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}

impl Entity for Commodity {
    const ENTITY: &'static str = "Commodity";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}

impl Entity for FileEntity {
    const ENTITY: &'static str = "File";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}

/// CRUD contract over one inventory collection.
///
/// `create` keeps the entity's ID, assigning a fresh UUID only when the ID
/// is empty, and fails with a conflict if the ID is taken. `get` is a pure
/// existence probe.
#[async_trait]
pub trait Registry<T: Entity>: Send + Sync {
    async fn create(&self, item: &T) -> StoreResult<T>;
    async fn get(&self, id: &str) -> StoreResult<Option<T>>;
    async fn list(&self) -> StoreResult<Vec<T>>;
    async fn update(&self, item: &T) -> StoreResult<T>;
    async fn delete(&self, id: &str) -> StoreResult<()>;
}

/// The registries a job reads from and writes to.
#[derive(Clone)]
pub struct RegistrySet {
    pub locations: Arc<dyn Registry<Location>>,
    pub areas: Arc<dyn Registry<Area>>,
    pub commodities: Arc<dyn Registry<Commodity>>,
    pub files: Arc<dyn Registry<FileEntity>>,
}

impl RegistrySet {
    /// Registries backed by the Postgres repositories.
    pub fn postgres(pool: DbPool) -> Self {
        let store = Arc::new(postgres::PgStore::new(pool));
        Self {
            locations: store.clone(),
            areas: store.clone(),
            commodities: store.clone(),
            files: store,
        }
    }

    /// Fresh, empty in-memory registries.
    pub fn in_memory() -> Self {
        Self {
            locations: Arc::new(memory::MemoryRegistry::<Location>::default()),
            areas: Arc::new(memory::MemoryRegistry::<Area>::default()),
            commodities: Arc::new(memory::MemoryRegistry::<Commodity>::default()),
            files: Arc::new(memory::MemoryRegistry::<FileEntity>::default()),
        }
    }
}

/// ID for an entity created without one.
pub(crate) fn new_entity_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
