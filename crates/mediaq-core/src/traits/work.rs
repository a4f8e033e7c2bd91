//! The opaque AI work function contract.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::types::{ItemId, MediaKind};

/// Classified failure of a work function call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkError {
    /// The call may succeed later; the job is retried with backoff.
    #[error("Transient work failure: {0}")]
    Transient(String),

    /// The item can never be processed; it is marked failed.
    #[error("Permanent work failure: {0}")]
    Permanent(String),
}

/// Processes a single media item.
///
/// Implementations must watch `cancel` and return promptly once it fires.
/// Whatever they return after cancellation is discarded and the job is
/// retried, so they must not commit partial results.
#[async_trait]
pub trait WorkFunction: Send + Sync + std::fmt::Debug + 'static {
    /// Run AI processing for one item.
    async fn process(
        &self,
        item_id: ItemId,
        kind: MediaKind,
        cancel: CancellationToken,
    ) -> Result<(), WorkError>;
}
