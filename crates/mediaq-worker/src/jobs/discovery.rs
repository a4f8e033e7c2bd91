//! Batch discovery: fan pending items out into item-process jobs.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing;

use mediaq_core::traits::ItemStore;
use mediaq_entity::job::{Job, JobKind, JobPayload};

use crate::executor::{JobExecutionError, JobHandler, JobOutcome};
use crate::queue::JobQueue;

/// Handles batch-discovery jobs
#[derive(Debug)]
pub struct DiscoveryJobHandler {
    /// Source of pending items
    store: Arc<dyn ItemStore>,
    /// Queue item jobs are published to
    queue: JobQueue,
}

impl DiscoveryJobHandler {
    /// Create a new discovery job handler
    pub fn new(store: Arc<dyn ItemStore>, queue: JobQueue) -> Self {
        Self { store, queue }
    }
}

#[async_trait]
impl JobHandler for DiscoveryJobHandler {
    fn job_kind(&self) -> JobKind {
        JobKind::BatchDiscovery
    }

    async fn execute(
        &self,
        job: &Job,
        cancel: CancellationToken,
    ) -> Result<JobOutcome, JobExecutionError> {
        let JobPayload::BatchDiscovery {
            media_kind,
            batch_size_limit,
        } = job.payload
        else {
            return Err(JobExecutionError::Permanent(format!(
                "Job {} does not carry a discovery payload",
                job.id
            )));
        };

        let pending = self
            .store
            .list_pending(media_kind, batch_size_limit)
            .await
            .map_err(|e| JobExecutionError::Transient(format!("Listing pending items failed: {}", e)))?;

        let discovered = pending.len();
        let mut enqueued = 0usize;

        for item_id in pending {
            if cancel.is_cancelled() {
                break;
            }
            match self.queue.enqueue_item(item_id, media_kind, &cancel).await {
                Ok(_) => enqueued += 1,
                Err(_) if cancel.is_cancelled() => break,
                Err(e) => return Err(JobExecutionError::Internal(e)),
            }
        }

        if enqueued < discovered {
            tracing::warn!(
                job_id = %job.id,
                kind = %media_kind,
                discovered,
                enqueued,
                "Discovery stopped early"
            );
        } else {
            tracing::info!(
                job_id = %job.id,
                kind = %media_kind,
                discovered,
                "Discovery enqueued all pending items"
            );
        }

        Ok(JobOutcome::Completed(serde_json::json!({
            "kind": media_kind,
            "discovered": discovered,
            "enqueued": enqueued,
        })))
    }
}
