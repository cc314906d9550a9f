pub mod exports;
pub mod restores;
pub mod uploads;
