//! Daily schedule entries.

pub mod entry;

pub use entry::ScheduleEntry;
