//! Job queue: the worker-side view of the broker.
//!
//! Wraps a [`JobBroker`] and retries retryable failures (`BrokerUnavailable`) with
//! jittered exponential backoff until the operation succeeds or the caller
//! cancels. Jobs are never dropped because the broker blinked.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing;

use mediaq_broker::{BrokerStats, JobBroker};
use mediaq_core::config::broker::BrokerConfig;
use mediaq_core::config::processing::ProcessingConfig;
use mediaq_core::result::AppResult;
use mediaq_core::types::{ItemId, JobId, MediaKind};
use mediaq_entity::job::{Job, JobPayload};

/// Token that cancels itself after `timeout`. One-shot callers pass it to
/// queue operations so an unreachable broker ends in an error.
pub fn deadline(timeout: Duration) -> CancellationToken {
    let token = CancellationToken::new();
    let expire = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(timeout).await;
        expire.cancel();
    });
    token
}

/// Retrying job queue over a broker
#[derive(Debug, Clone)]
pub struct JobQueue {
    /// Underlying broker
    broker: Arc<dyn JobBroker>,
    /// First backoff delay
    retry_initial: Duration,
    /// Backoff ceiling
    retry_max: Duration,
    /// Attempt budget stamped on new jobs
    max_attempts: u32,
    /// Whether uploads enqueue processing immediately
    auto_process_on_upload: bool,
}

impl JobQueue {
    /// Create a new job queue
    pub fn new(
        broker: Arc<dyn JobBroker>,
        broker_config: &BrokerConfig,
        processing: &ProcessingConfig,
    ) -> Self {
        Self {
            broker,
            retry_initial: Duration::from_millis(broker_config.retry_initial_ms.max(1)),
            retry_max: Duration::from_millis(broker_config.retry_max_ms.max(1)),
            max_attempts: processing.max_attempts,
            auto_process_on_upload: processing.auto_process_on_upload,
        }
    }

    /// Access the underlying broker
    pub fn broker(&self) -> &Arc<dyn JobBroker> {
        &self.broker
    }

    /// Backoff before retry number `retry` (0-based), jittered into the
    /// upper half of the exponential delay.
    fn backoff(&self, retry: u32) -> Duration {
        let exp = self
            .retry_initial
            .saturating_mul(2u32.saturating_pow(retry.min(16)));
        let capped = exp.min(self.retry_max);
        let millis = capped.as_millis() as u64;
        let jittered = rand::rng().random_range(millis / 2..=millis);
        Duration::from_millis(jittered)
    }

    async fn with_retry<T, F, Fut>(
        &self,
        operation: &str,
        cancel: &CancellationToken,
        mut call: F,
    ) -> AppResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        let mut retry = 0u32;
        loop {
            match call().await {
                Err(e) if e.is_retryable() => {
                    let delay = self.backoff(retry);
                    tracing::warn!(
                        operation,
                        retry,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Broker unavailable, retrying"
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(e),
                        _ = tokio::time::sleep(delay) => {}
                    }
                    retry = retry.saturating_add(1);
                }
                other => return other,
            }
        }
    }

    /// Build a pending job carrying the configured attempt budget
    pub fn job(&self, payload: JobPayload) -> Job {
        Job::new(payload, self.max_attempts)
    }

    /// Enqueue a job with a single broker call
    pub async fn try_enqueue(&self, job: Job) -> AppResult<JobId> {
        self.broker.enqueue(job).await
    }

    /// Enqueue a job, retrying while the broker is unreachable
    pub async fn enqueue(&self, job: Job, cancel: &CancellationToken) -> AppResult<JobId> {
        let id = self
            .with_retry("enqueue", cancel, || self.broker.enqueue(job.clone()))
            .await?;
        tracing::debug!(job_id = %id, kind = %job.kind(), "Job enqueued");
        Ok(id)
    }

    /// Enqueue a batch-discovery job for `kind`
    pub async fn enqueue_discovery(
        &self,
        kind: MediaKind,
        batch_size_limit: usize,
        cancel: &CancellationToken,
    ) -> AppResult<JobId> {
        let job = self.job(JobPayload::BatchDiscovery {
            media_kind: kind,
            batch_size_limit,
        });
        self.enqueue(job, cancel).await
    }

    /// Enqueue an item-process job
    pub async fn enqueue_item(
        &self,
        item_id: ItemId,
        kind: MediaKind,
        cancel: &CancellationToken,
    ) -> AppResult<JobId> {
        let job = self.job(JobPayload::ItemProcess {
            item_id,
            item_kind: kind,
        });
        self.enqueue(job, cancel).await
    }

    /// Enqueue processing for a freshly uploaded item when automatic
    /// processing is enabled. Returns `None` when it is disabled.
    pub async fn enqueue_item_on_upload(
        &self,
        item_id: ItemId,
        kind: MediaKind,
        cancel: &CancellationToken,
    ) -> AppResult<Option<JobId>> {
        if !self.auto_process_on_upload {
            tracing::debug!(item_id = %item_id, "Automatic processing disabled, not enqueuing");
            return Ok(None);
        }
        self.enqueue_item(item_id, kind, cancel).await.map(Some)
    }

    /// Wait up to `timeout` for a job. Returns `None` on timeout or when
    /// `cancel` fires.
    pub async fn dequeue(
        &self,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> AppResult<Option<Job>> {
        let result = tokio::select! {
            _ = cancel.cancelled() => return Ok(None),
            res = self.with_retry("dequeue", cancel, || self.broker.dequeue(timeout)) => res,
        };
        match result {
            Err(e) if e.is_retryable() && cancel.is_cancelled() => Ok(None),
            other => other,
        }
    }

    /// Acknowledge a finished job
    pub async fn ack(&self, job_id: JobId, cancel: &CancellationToken) -> AppResult<()> {
        self.with_retry("ack", cancel, || self.broker.ack(job_id)).await
    }

    /// Return a job to the queue after `delay`
    pub async fn nack(
        &self,
        job_id: JobId,
        delay: Duration,
        cancel: &CancellationToken,
    ) -> AppResult<()> {
        self.with_retry("nack", cancel, || self.broker.nack(job_id, delay))
            .await
    }

    /// Get queue statistics
    pub async fn stats(&self) -> AppResult<BrokerStats> {
        self.broker.stats().await
    }
}
