//! Postgres adapter: implements the store and registry traits by
//! delegating to the repositories.

use async_trait::async_trait;
use stockpile_core::backup::JobStatus;
use stockpile_core::types::DbId;

use super::{new_entity_id, Entity, JobStore, Registry};
use crate::error::{StoreError, StoreResult};
use crate::models::area::Area;
use crate::models::commodity::Commodity;
use crate::models::export::{CreateExport, Export};
use crate::models::file::FileEntity;
use crate::models::location::Location;
use crate::models::restore_operation::{CreateRestoreOperation, RestoreOperation};
use crate::models::restore_step::{CreateRestoreStep, RestoreStep};
use crate::repositories::{
    AreaRepo, CommodityRepo, ExportRepo, FileRepo, LocationRepo, RestoreOperationRepo,
    RestoreStepRepo,
};
use crate::DbPool;

/// Store and registries over one connection pool.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

fn found<T>(entity: &'static str, id: impl ToString, row: Option<T>) -> StoreResult<T> {
    row.ok_or_else(|| StoreError::not_found(entity, id))
}

fn deleted(entity: &'static str, id: impl ToString, removed: bool) -> StoreResult<()> {
    if removed {
        Ok(())
    } else {
        Err(StoreError::not_found(entity, id))
    }
}

#[async_trait]
impl JobStore for PgStore {
    async fn create_export(&self, input: &CreateExport) -> StoreResult<Export> {
        ExportRepo::create(&self.pool, input)
            .await
            .map_err(StoreError::from_write)
    }

    async fn get_export(&self, id: DbId) -> StoreResult<Option<Export>> {
        Ok(ExportRepo::find_by_id(&self.pool, id).await?)
    }

    async fn list_exports(&self) -> StoreResult<Vec<Export>> {
        Ok(ExportRepo::list(&self.pool).await?)
    }

    async fn list_exports_by_status(&self, statuses: &[JobStatus]) -> StoreResult<Vec<Export>> {
        Ok(ExportRepo::list_by_status(&self.pool, statuses).await?)
    }

    async fn update_export(&self, export: &Export) -> StoreResult<Export> {
        let row = ExportRepo::update(&self.pool, export)
            .await
            .map_err(StoreError::from_write)?;
        found("Export", export.id, row)
    }

    async fn delete_export(&self, id: DbId) -> StoreResult<()> {
        if ExportRepo::delete(&self.pool, id).await? {
            return Ok(());
        }
        match ExportRepo::find_by_id(&self.pool, id).await? {
            Some(_) => Err(StoreError::Conflict(format!(
                "export {id} or one of its restores is running"
            ))),
            None => Err(StoreError::not_found("Export", id)),
        }
    }

    async fn create_restore_operation(
        &self,
        input: &CreateRestoreOperation,
    ) -> StoreResult<RestoreOperation> {
        RestoreOperationRepo::create(&self.pool, input)
            .await
            .map_err(StoreError::from_write)
    }

    async fn get_restore_operation(&self, id: DbId) -> StoreResult<Option<RestoreOperation>> {
        Ok(RestoreOperationRepo::find_by_id(&self.pool, id).await?)
    }

    async fn list_restore_operations(&self) -> StoreResult<Vec<RestoreOperation>> {
        Ok(RestoreOperationRepo::list(&self.pool).await?)
    }

    async fn list_restore_operations_by_export(
        &self,
        export_id: DbId,
    ) -> StoreResult<Vec<RestoreOperation>> {
        Ok(RestoreOperationRepo::list_by_export(&self.pool, export_id).await?)
    }

    async fn list_restore_operations_by_status(
        &self,
        statuses: &[JobStatus],
    ) -> StoreResult<Vec<RestoreOperation>> {
        Ok(RestoreOperationRepo::list_by_status(&self.pool, statuses).await?)
    }

    async fn update_restore_operation(
        &self,
        op: &RestoreOperation,
    ) -> StoreResult<RestoreOperation> {
        let row = RestoreOperationRepo::update(&self.pool, op)
            .await
            .map_err(StoreError::from_write)?;
        found("RestoreOperation", op.id, row)
    }

    async fn delete_restore_operation(&self, id: DbId) -> StoreResult<()> {
        if RestoreOperationRepo::delete(&self.pool, id).await? {
            return Ok(());
        }
        match RestoreOperationRepo::find_by_id(&self.pool, id).await? {
            Some(_) => Err(StoreError::Conflict(format!(
                "restore operation {id} is running"
            ))),
            None => Err(StoreError::not_found("RestoreOperation", id)),
        }
    }

    async fn create_restore_step(&self, input: &CreateRestoreStep) -> StoreResult<RestoreStep> {
        RestoreStepRepo::create(&self.pool, input)
            .await
            .map_err(StoreError::from_write)
    }

    async fn update_restore_step(&self, step: &RestoreStep) -> StoreResult<RestoreStep> {
        let row = RestoreStepRepo::update(&self.pool, step).await?;
        found("RestoreStep", step.id, row)
    }

    async fn list_steps_by_restore_operation(
        &self,
        restore_operation_id: DbId,
    ) -> StoreResult<Vec<RestoreStep>> {
        Ok(RestoreStepRepo::list_by_restore_operation(&self.pool, restore_operation_id).await?)
    }

    async fn list_steps_by_export(&self, export_id: DbId) -> StoreResult<Vec<RestoreStep>> {
        Ok(RestoreStepRepo::list_by_export(&self.pool, export_id).await?)
    }
}

/// Implements [`Registry`] for one entity by naming its repository.
macro_rules! pg_registry {
    ($entity:ty, $repo:ident) => {
        #[async_trait]
        impl Registry<$entity> for PgStore {
            async fn create(&self, item: &$entity) -> StoreResult<$entity> {
                let mut item = item.clone();
                if item.id().is_empty() {
                    item.set_id(new_entity_id());
                }
                $repo::create(&self.pool, &item)
                    .await
                    .map_err(StoreError::from_write)
            }

            async fn get(&self, id: &str) -> StoreResult<Option<$entity>> {
                Ok($repo::find_by_id(&self.pool, id).await?)
            }

            async fn list(&self) -> StoreResult<Vec<$entity>> {
                Ok($repo::list(&self.pool).await?)
            }

            async fn update(&self, item: &$entity) -> StoreResult<$entity> {
                let row = $repo::update(&self.pool, item)
                    .await
                    .map_err(StoreError::from_write)?;
                found(<$entity as Entity>::ENTITY, item.id(), row)
            }

            async fn delete(&self, id: &str) -> StoreResult<()> {
                let removed = $repo::delete(&self.pool, id).await?;
                deleted(<$entity as Entity>::ENTITY, id, removed)
            }
        }
    };
}

pg_registry!(Location, LocationRepo);
pg_registry!(Area, AreaRepo);
pg_registry!(Commodity, CommodityRepo);
pg_registry!(FileEntity, FileRepo);
