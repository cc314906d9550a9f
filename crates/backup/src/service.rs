//! Entry points used by the HTTP layer: create jobs after checking their
//! preconditions, hand them to the pool, and read them back.
//!
//! Creation is the only synchronous failure point. Once a job record exists
//! it always reaches a terminal status through the pool.

use stockpile_core::backup::{
    validate_description, validate_restore_request, validate_selected_items,
    validate_source_file_path, JobStatus, UPLOADS_PREFIX,
};
use stockpile_core::error::CoreError;
use stockpile_core::types::DbId;
use stockpile_db::models::export::{CreateExport, Export};
use stockpile_db::models::restore_operation::{CreateRestoreOperation, RestoreOperation};
use stockpile_db::models::restore_step::RestoreStep;

use crate::error::BackupError;
use crate::job::{mark_failed, Actor, BackupContext, JobRequest};
use crate::pool::WorkerPool;

#[derive(Clone)]
pub struct BackupService {
    ctx: BackupContext,
    pool: WorkerPool,
}

impl BackupService {
    pub fn new(ctx: BackupContext, pool: WorkerPool) -> Self {
        Self { ctx, pool }
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Hand a freshly created job to the pool. A pool that is shutting down
    /// fails the job at once so the record does not linger as pending.
    async fn dispatch(&self, job: JobRequest) -> Result<(), BackupError> {
        let (kind, id) = (job.kind, job.id);
        if let Err(e) = self.pool.submit(job) {
            mark_failed(&self.ctx, kind, id, &e.to_string()).await;
            return Err(e);
        }
        Ok(())
    }

    // -- Exports -------------------------------------------------------------

    pub async fn create_export(
        &self,
        actor: &Actor,
        input: &CreateExport,
    ) -> Result<Export, BackupError> {
        validate_description(&input.description)?;
        validate_selected_items(input.export_type, &input.selected_items)?;

        let export = self.ctx.store.create_export(input).await?;
        tracing::info!(
            export_id = export.id,
            export_type = %export.export_type,
            tenant_id = %actor.tenant_id,
            user_id = %actor.user_id,
            "Export created"
        );
        self.dispatch(JobRequest::export(export.id, actor.clone()))
            .await?;
        Ok(export)
    }

    pub async fn get_export(&self, id: DbId) -> Result<Export, BackupError> {
        self.ctx
            .store
            .get_export(id)
            .await?
            .ok_or_else(|| CoreError::not_found("Export", id).into())
    }

    pub async fn list_exports(&self) -> Result<Vec<Export>, BackupError> {
        Ok(self.ctx.store.list_exports().await?)
    }

    /// Delete an export and its document. Refused while the export or one
    /// of its restores is still active.
    pub async fn delete_export(&self, id: DbId) -> Result<(), BackupError> {
        let export = self.get_export(id).await?;
        if export.status.is_active() {
            return Err(CoreError::Conflict(format!(
                "Export {id} is {} and cannot be deleted",
                export.status
            ))
            .into());
        }
        let restores = self.ctx.store.list_restore_operations_by_export(id).await?;
        if restores.iter().any(|r| r.status.is_active()) {
            return Err(CoreError::Conflict(format!(
                "Export {id} has an active restore operation"
            ))
            .into());
        }

        self.ctx.store.delete_export(id).await?;
        if let Some(path) = &export.file_path {
            if let Err(e) = self.ctx.bucket.delete(path).await {
                tracing::warn!(export_id = id, %path, error = %e, "Could not delete export file");
            }
        }
        tracing::info!(export_id = id, "Export deleted");
        Ok(())
    }

    // -- Uploads -------------------------------------------------------------

    /// Store an uploaded backup document and return its bucket key.
    pub async fn upload_source(&self, bytes: &[u8]) -> Result<String, BackupError> {
        if bytes.is_empty() {
            return Err(CoreError::Validation("Uploaded file is empty".to_string()).into());
        }
        let key = format!("{UPLOADS_PREFIX}/{}.xml", uuid::Uuid::new_v4());
        self.ctx.bucket.write(&key, bytes).await?;
        tracing::info!(%key, size = bytes.len(), "Backup file uploaded");
        Ok(key)
    }

    // -- Restores ------------------------------------------------------------

    /// Create a restore operation and queue it.
    ///
    /// Preconditions: exactly one source, a coherent strategy and option set,
    /// a source export that is completed with a document, or an uploaded
    /// source present in the bucket.
    pub async fn create_restore(
        &self,
        actor: &Actor,
        input: &CreateRestoreOperation,
    ) -> Result<RestoreOperation, BackupError> {
        validate_restore_request(
            input.export_id.is_some(),
            input.source_file_path.is_some(),
            input.strategy,
            input.options.dry_run,
        )?;

        if let Some(export_id) = input.export_id {
            let export = self.get_export(export_id).await?;
            if export.status != JobStatus::Completed || export.file_path.is_none() {
                return Err(CoreError::Validation(format!(
                    "Export {export_id} is {} and has no backup file to restore",
                    export.status
                ))
                .into());
            }
        }
        if let Some(path) = &input.source_file_path {
            validate_source_file_path(path)?;
            if !self.ctx.bucket.exists(path).await? {
                return Err(CoreError::Validation(format!(
                    "Source file {path} does not exist"
                ))
                .into());
            }
        }

        let op = self.ctx.store.create_restore_operation(input).await?;
        tracing::info!(
            restore_id = op.id,
            strategy = %op.strategy,
            dry_run = op.options.dry_run,
            tenant_id = %actor.tenant_id,
            user_id = %actor.user_id,
            "Restore operation created"
        );
        self.dispatch(JobRequest::restore(op.id, actor.clone()))
            .await?;
        Ok(op)
    }

    /// One restore operation with its steps.
    pub async fn get_restore(&self, id: DbId) -> Result<RestoreOperation, BackupError> {
        let mut op = self
            .ctx
            .store
            .get_restore_operation(id)
            .await?
            .ok_or_else(|| CoreError::not_found("RestoreOperation", id))?;
        op.steps = self.ctx.store.list_steps_by_restore_operation(id).await?;
        Ok(op)
    }

    pub async fn list_restores(&self) -> Result<Vec<RestoreOperation>, BackupError> {
        Ok(self.ctx.store.list_restore_operations().await?)
    }

    pub async fn list_restores_by_export(
        &self,
        export_id: DbId,
    ) -> Result<Vec<RestoreOperation>, BackupError> {
        self.get_export(export_id).await?;
        Ok(self
            .ctx
            .store
            .list_restore_operations_by_export(export_id)
            .await?)
    }

    pub async fn list_restore_steps(&self, id: DbId) -> Result<Vec<RestoreStep>, BackupError> {
        self.get_restore(id).await.map(|op| op.steps)
    }

    pub async fn list_export_restore_steps(
        &self,
        export_id: DbId,
    ) -> Result<Vec<RestoreStep>, BackupError> {
        self.get_export(export_id).await?;
        Ok(self.ctx.store.list_steps_by_export(export_id).await?)
    }

    /// Delete a finished or queued restore operation with its steps.
    pub async fn delete_restore(&self, id: DbId) -> Result<(), BackupError> {
        let op = self.get_restore(id).await?;
        if op.status == JobStatus::Running {
            return Err(CoreError::Conflict(format!(
                "Restore operation {id} is running and cannot be deleted"
            ))
            .into());
        }
        // Still refused by the store if the pool started it since the check.
        self.ctx.store.delete_restore_operation(id).await?;
        tracing::info!(restore_id = id, "Restore operation deleted");
        Ok(())
    }

    pub async fn has_running_restores(&self) -> Result<bool, BackupError> {
        self.pool.has_running_restores().await
    }
}
