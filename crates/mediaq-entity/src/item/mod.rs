//! Media item processing-state entities.

pub mod model;

pub use mediaq_core::types::{MediaKind, ProcessingStatus};
pub use model::MediaItem;
