//! Shared value types.

pub mod id;
pub mod media;

pub use id::{ItemId, JobId};
pub use media::{MediaKind, ProcessingStatus, StatusCounts};
