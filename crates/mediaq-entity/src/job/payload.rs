//! Typed job payload definitions.

use serde::{Deserialize, Serialize};
use std::fmt;

use mediaq_core::types::{ItemId, MediaKind};

/// Discriminant of a job, used to route it to a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Finds pending items and fans out item-process jobs.
    BatchDiscovery,
    /// Runs AI processing for a single item.
    ItemProcess,
}

impl JobKind {
    /// Return the kind as a snake_case string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BatchDiscovery => "batch_discovery",
            Self::ItemProcess => "item_process",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed payloads for the two job kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobPayload {
    /// Discover up to `batch_size_limit` pending items of `media_kind`.
    BatchDiscovery {
        /// Media kind to look for.
        media_kind: MediaKind,
        /// Maximum number of item jobs to enqueue.
        batch_size_limit: usize,
    },
    /// Process a single media item.
    ItemProcess {
        /// Item to process.
        item_id: ItemId,
        /// Kind of the item.
        item_kind: MediaKind,
    },
}

impl JobPayload {
    /// The job kind this payload belongs to.
    pub fn kind(&self) -> JobKind {
        match self {
            Self::BatchDiscovery { .. } => JobKind::BatchDiscovery,
            Self::ItemProcess { .. } => JobKind::ItemProcess,
        }
    }
}
