//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async CRUD methods
//! that accept `&PgPool` as the first argument.

pub mod area_repo;
pub mod commodity_repo;
pub mod export_repo;
pub mod file_repo;
pub mod location_repo;
pub mod restore_operation_repo;
pub mod restore_step_repo;

pub use area_repo::AreaRepo;
pub use commodity_repo::CommodityRepo;
pub use export_repo::ExportRepo;
pub use file_repo::FileRepo;
pub use location_repo::LocationRepo;
pub use restore_operation_repo::RestoreOperationRepo;
pub use restore_step_repo::RestoreStepRepo;

use stockpile_core::backup::JobStatus;

/// Status names bound as a `TEXT[]` parameter for `status = ANY($n)`.
pub(crate) fn status_names(statuses: &[JobStatus]) -> Vec<String> {
    statuses.iter().map(|s| s.as_str().to_string()).collect()
}
