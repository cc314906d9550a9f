//! Restore audit trail.

use std::sync::Arc;

use stockpile_core::backup::StepResult;
use stockpile_core::types::DbId;
use stockpile_db::models::restore_step::{CreateRestoreStep, RestoreStep};
use stockpile_db::store::JobStore;
use stockpile_db::StoreResult;

/// Appends and amends the steps of one restore operation.
#[derive(Clone)]
pub struct StepRecorder {
    store: Arc<dyn JobStore>,
    restore_operation_id: DbId,
}

impl StepRecorder {
    pub fn new(store: Arc<dyn JobStore>, restore_operation_id: DbId) -> Self {
        Self {
            store,
            restore_operation_id,
        }
    }

    pub async fn create_step(
        &self,
        name: impl Into<String>,
        result: StepResult,
        reason: impl Into<String>,
    ) -> StoreResult<RestoreStep> {
        self.store
            .create_restore_step(&CreateRestoreStep {
                restore_operation_id: self.restore_operation_id,
                name: name.into(),
                result,
                reason: reason.into(),
            })
            .await
    }

    /// Amend the most recent step called `name`, creating it if there is none.
    pub async fn update_step(
        &self,
        name: &str,
        result: StepResult,
        reason: impl Into<String>,
    ) -> StoreResult<RestoreStep> {
        let latest = self
            .store
            .list_steps_by_restore_operation(self.restore_operation_id)
            .await?
            .into_iter()
            .rev()
            .find(|s| s.name == name);

        match latest {
            Some(mut step) => {
                step.result = result;
                step.reason = reason.into();
                self.store.update_restore_step(&step).await
            }
            None => self.create_step(name, result, reason).await,
        }
    }

    /// Mark every step still in progress as an error with `reason`.
    pub async fn close_open_steps(&self, reason: &str) -> StoreResult<usize> {
        let open: Vec<RestoreStep> = self
            .store
            .list_steps_by_restore_operation(self.restore_operation_id)
            .await?
            .into_iter()
            .filter(|s| s.result == StepResult::InProgress)
            .collect();
        for mut step in open.iter().cloned() {
            step.result = StepResult::Error;
            step.reason = reason.to_string();
            self.store.update_restore_step(&step).await?;
        }
        Ok(open.len())
    }
}

#[cfg(test)]
mod tests {
    use stockpile_core::backup::RestoreStrategy;
    use stockpile_db::models::restore_operation::{CreateRestoreOperation, RestoreOptions};
    use stockpile_db::store::memory::MemoryJobStore;

    use super::*;

    async fn recorder() -> (Arc<MemoryJobStore>, StepRecorder) {
        let store = Arc::new(MemoryJobStore::new());
        let op = store
            .create_restore_operation(&CreateRestoreOperation {
                export_id: None,
                source_file_path: Some("uploads/a.xml".to_string()),
                description: None,
                strategy: RestoreStrategy::MergeAdd,
                options: RestoreOptions::default(),
            })
            .await
            .unwrap();
        let steps = StepRecorder::new(store.clone(), op.id);
        (store, steps)
    }

    #[tokio::test]
    async fn update_amends_latest_step_with_that_name() {
        let (store, steps) = recorder().await;
        let first = steps
            .create_step("Process areas", StepResult::InProgress, "first")
            .await
            .unwrap();
        let second = steps
            .create_step("Process areas", StepResult::InProgress, "second")
            .await
            .unwrap();

        let updated = steps
            .update_step("Process areas", StepResult::Success, "done")
            .await
            .unwrap();
        assert_eq!(updated.id, second.id);

        let all = store
            .list_steps_by_restore_operation(first.restore_operation_id)
            .await
            .unwrap();
        assert_eq!(all[0].result, StepResult::InProgress);
        assert_eq!(all[1].result, StepResult::Success);
        assert_eq!(all[1].reason, "done");
    }

    #[tokio::test]
    async fn update_without_match_creates_step() {
        let (store, steps) = recorder().await;
        let step = steps
            .update_step("Read backup file", StepResult::Error, "missing")
            .await
            .unwrap();
        let all = store
            .list_steps_by_restore_operation(step.restore_operation_id)
            .await
            .unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "Read backup file");
    }

    #[tokio::test]
    async fn close_open_steps_only_touches_in_progress() {
        let (store, steps) = recorder().await;
        steps.create_step("a", StepResult::Success, "").await.unwrap();
        steps.create_step("b", StepResult::InProgress, "").await.unwrap();

        assert_eq!(steps.close_open_steps("Aborted").await.unwrap(), 1);
        let all = store
            .list_steps_by_restore_operation(steps.restore_operation_id)
            .await
            .unwrap();
        assert_eq!(all[0].result, StepResult::Success);
        assert_eq!(all[1].result, StepResult::Error);
        assert_eq!(all[1].reason, "Aborted");
    }
}
