//! Media kind and processing-state enumerations shared by the store,
//! the scheduler configuration, and job payloads.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Kind of media item awaiting AI processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "media_kind", rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// A still image.
    Photo,
    /// A video clip.
    Video,
}

impl MediaKind {
    /// All known kinds, in display order.
    pub const ALL: [MediaKind; 2] = [MediaKind::Photo, MediaKind::Video];

    /// Return the kind as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Photo => "photo",
            Self::Video => "video",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "photo" | "photos" => Ok(Self::Photo),
            "video" | "videos" => Ok(Self::Video),
            other => Err(AppError::validation(format!(
                "Unknown media kind '{other}'. Supported: photo, video"
            ))),
        }
    }
}

/// AI processing state of a media item.
///
/// The only legal transitions are `Pending -> Processing` (claim),
/// `Processing -> Pending` (release), and `Processing -> Processed | Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "processing_status", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    /// Waiting for discovery.
    Pending,
    /// Claimed by a job.
    Processing,
    /// AI processing finished successfully.
    Processed,
    /// AI processing gave up.
    Failed,
}

impl ProcessingStatus {
    /// Whether the item has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Processed | Self::Failed)
    }

    /// Return the status as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Processed => "processed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-status item counts for one media kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    /// Items waiting for discovery.
    pub pending: u64,
    /// Items currently claimed.
    pub processing: u64,
    /// Items processed successfully.
    pub processed: u64,
    /// Items that failed permanently.
    pub failed: u64,
}

impl StatusCounts {
    /// Total number of items across all states.
    pub fn total(&self) -> u64 {
        self.pending + self.processing + self.processed + self.failed
    }
}
