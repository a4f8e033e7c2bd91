//! Item store trait: the processing-state view of media metadata.

use async_trait::async_trait;

use crate::result::AppResult;
use crate::types::{ItemId, JobId, MediaKind, StatusCounts};

/// Persistence for media item processing state.
///
/// Every mutation is a conditional transition. `try_claim` is the only
/// guard against two deliveries of the same item being processed twice,
/// so implementations must make it atomic.
#[async_trait]
pub trait ItemStore: Send + Sync + std::fmt::Debug + 'static {
    /// List up to `limit` pending items of `kind`, oldest first.
    async fn list_pending(&self, kind: MediaKind, limit: usize) -> AppResult<Vec<ItemId>>;

    /// Transition `pending -> processing` on behalf of `job_id`.
    ///
    /// Returns `true` when the item is now held by `job_id`. An item that
    /// is already `processing` under the same job counts as claimed, since
    /// that only happens when the job is redelivered after its previous
    /// worker was killed. Returns `false` for any other state.
    async fn try_claim(&self, item_id: ItemId, job_id: JobId) -> AppResult<bool>;

    /// Give a claimed item back (`processing -> pending`) so a later
    /// delivery can claim it again.
    async fn release(&self, item_id: ItemId, job_id: JobId) -> AppResult<bool>;

    /// Transition `processing -> processed` for the holder of the claim.
    async fn mark_processed(&self, item_id: ItemId, job_id: JobId) -> AppResult<bool>;

    /// Mark a non-terminal item `failed`, recording the error message.
    ///
    /// Fails the transition (returns `false`) when the item is terminal or
    /// held by a different job.
    async fn mark_failed(&self, item_id: ItemId, job_id: JobId, error: &str) -> AppResult<bool>;

    /// Count items of `kind` by processing status.
    async fn status_counts(&self, kind: MediaKind) -> AppResult<StatusCounts>;
}
