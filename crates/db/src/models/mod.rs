//! Row models and DTOs.
//!
//! Job records (`export`, `restore_operation`, `restore_step`) are owned by
//! the backup subsystem. Inventory entities (`location`, `area`,
//! `commodity`, `file`) are what it moves.

pub mod area;
pub mod commodity;
pub mod export;
pub mod file;
pub mod location;
pub mod restore_operation;
pub mod restore_step;
