//! Pure domain layer for the inventory backup subsystem.
//!
//! Nothing in this crate performs I/O. It holds the shared ID/timestamp
//! types, the error vocabulary, the closed enums that describe job and step
//! state, the restore strategy resolver, and the statistics accumulator the
//! orchestrators fill in while a job runs.

pub mod backup;
pub mod error;
pub mod stats;
pub mod strategy;
pub mod types;
