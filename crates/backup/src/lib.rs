//! Backup export / restore job subsystem.
//!
//! - [`bucket`]: blob storage for XML documents and attachment bytes.
//! - [`xml`]: the hierarchical `<inventory>` wire format.
//! - [`steps`]: the per-restore audit trail.
//! - [`export`] / [`restore`]: the orchestrators that drive one job from
//!   pending to a terminal state.
//! - [`pool`]: bounded-concurrency execution, decoupled from requests.
//! - [`service`]: job creation with precondition checks, used by the API.

pub mod bucket;
pub mod error;
pub mod export;
pub mod job;
pub mod pool;
pub mod restore;
pub mod service;
pub mod steps;
pub mod xml;

pub use error::BackupError;
pub use job::{Actor, BackupContext, JobKind, JobRequest};
pub use pool::{PoolConfig, WorkerPool};
pub use service::BackupService;
