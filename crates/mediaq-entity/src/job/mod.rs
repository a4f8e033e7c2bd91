//! Queued job domain entities.

pub mod model;
pub mod payload;
pub mod status;

pub use model::Job;
pub use payload::{JobKind, JobPayload};
pub use status::JobStatus;
