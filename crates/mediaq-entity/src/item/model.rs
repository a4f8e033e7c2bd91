//! Media item entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use mediaq_core::types::{ItemId, JobId, MediaKind, ProcessingStatus};

/// The processing-state view of an uploaded photo or video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct MediaItem {
    /// Unique item identifier.
    pub id: ItemId,
    /// Photo or video.
    pub kind: MediaKind,
    /// Current AI processing state.
    pub processing_status: ProcessingStatus,
    /// Job currently holding the claim.
    pub claimed_by: Option<JobId>,
    /// When the current claim was taken.
    pub claimed_at: Option<DateTime<Utc>>,
    /// Last processing error, if any.
    pub processing_error: Option<String>,
    /// Upload time; discovery runs oldest first.
    pub created_at: DateTime<Utc>,
    /// Last state change.
    pub updated_at: DateTime<Utc>,
}

impl MediaItem {
    /// Create a new pending item.
    pub fn new(kind: MediaKind, created_at: DateTime<Utc>) -> Self {
        Self {
            id: ItemId::new(),
            kind,
            processing_status: ProcessingStatus::Pending,
            claimed_by: None,
            claimed_at: None,
            processing_error: None,
            created_at,
            updated_at: created_at,
        }
    }
}
