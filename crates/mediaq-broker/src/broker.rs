//! Broker trait: at-least-once job delivery with visibility timeouts.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use mediaq_core::result::AppResult;
use mediaq_core::types::JobId;
use mediaq_entity::job::Job;

/// Queue depth counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerStats {
    /// Jobs visible to consumers.
    pub ready: u64,
    /// Jobs waiting out a requeue delay.
    pub delayed: u64,
    /// Jobs claimed and not yet acked or nacked.
    pub in_flight: u64,
}

/// A durable job queue.
///
/// A dequeued job is hidden from other consumers for the visibility
/// window. If it is neither acked nor nacked before the window closes the
/// broker makes it visible again with its attempt count incremented, so
/// every job is delivered at least once.
///
/// Connection failures surface as `ErrorKind::BrokerUnavailable`.
#[async_trait]
pub trait JobBroker: Send + Sync + std::fmt::Debug + 'static {
    /// Publish a job.
    async fn enqueue(&self, job: Job) -> AppResult<JobId>;

    /// Claim the next visible job, waiting up to `timeout` for one.
    async fn dequeue(&self, timeout: Duration) -> AppResult<Option<Job>>;

    /// Remove a claimed job permanently.
    async fn ack(&self, job_id: JobId) -> AppResult<()>;

    /// Return a claimed job to the queue after `requeue_delay`, counting
    /// one more attempt.
    async fn nack(&self, job_id: JobId, requeue_delay: Duration) -> AppResult<()>;

    /// Current queue depths.
    async fn stats(&self) -> AppResult<BrokerStats>;

    /// Check that the broker is reachable.
    async fn health_check(&self) -> AppResult<bool>;
}
