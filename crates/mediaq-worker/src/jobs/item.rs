//! Item processing: claim one media item and run the work function on it.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing;

use mediaq_core::traits::{ItemStore, WorkError, WorkFunction};
use mediaq_core::types::{ItemId, MediaKind};
use mediaq_entity::job::{Job, JobKind, JobPayload};

use crate::executor::{JobExecutionError, JobHandler, JobOutcome};

/// Handles item-process jobs
#[derive(Debug)]
pub struct ItemProcessJobHandler {
    /// Processing-state store
    store: Arc<dyn ItemStore>,
    /// The AI work function
    work: Arc<dyn WorkFunction>,
}

impl ItemProcessJobHandler {
    /// Create a new item-process job handler
    pub fn new(store: Arc<dyn ItemStore>, work: Arc<dyn WorkFunction>) -> Self {
        Self { store, work }
    }

    fn target(job: &Job) -> Result<(ItemId, MediaKind), JobExecutionError> {
        match job.payload {
            JobPayload::ItemProcess { item_id, item_kind } => Ok((item_id, item_kind)),
            JobPayload::BatchDiscovery { .. } => Err(JobExecutionError::Permanent(format!(
                "Job {} does not carry an item payload",
                job.id
            ))),
        }
    }

    async fn release(&self, item_id: ItemId, job: &Job) -> Result<(), JobExecutionError> {
        if !self.store.release(item_id, job.id).await? {
            tracing::warn!(job_id = %job.id, item_id = %item_id, "Item was not held by job on release");
        }
        Ok(())
    }
}

#[async_trait]
impl JobHandler for ItemProcessJobHandler {
    fn job_kind(&self) -> JobKind {
        JobKind::ItemProcess
    }

    async fn execute(
        &self,
        job: &Job,
        cancel: CancellationToken,
    ) -> Result<JobOutcome, JobExecutionError> {
        let (item_id, kind) = Self::target(job)?;

        if !self.store.try_claim(item_id, job.id).await? {
            tracing::info!(
                job_id = %job.id,
                item_id = %item_id,
                "Item already claimed or finished, discarding job"
            );
            return Ok(JobOutcome::Discarded(format!(
                "Item {} is not pending",
                item_id
            )));
        }

        let result = self.work.process(item_id, kind, cancel.clone()).await;

        if cancel.is_cancelled() {
            self.release(item_id, job).await?;
            return Ok(JobOutcome::Cancelled);
        }

        match result {
            Ok(()) => {
                if !self.store.mark_processed(item_id, job.id).await? {
                    tracing::warn!(job_id = %job.id, item_id = %item_id, "Lost claim before completion");
                }
                Ok(JobOutcome::Completed(serde_json::json!({
                    "item_id": item_id,
                    "kind": kind,
                })))
            }
            Err(WorkError::Transient(msg)) => {
                self.release(item_id, job).await?;
                Err(JobExecutionError::Transient(msg))
            }
            Err(WorkError::Permanent(msg)) => {
                self.store.mark_failed(item_id, job.id, &msg).await?;
                Err(JobExecutionError::Permanent(msg))
            }
        }
    }

    async fn exhausted(&self, job: &Job, reason: &str) -> Result<(), JobExecutionError> {
        let (item_id, _) = Self::target(job)?;
        if self.store.mark_failed(item_id, job.id, reason).await? {
            tracing::warn!(
                job_id = %job.id,
                item_id = %item_id,
                attempts = job.attempts,
                "Item marked failed after exhausting attempts"
            );
        }
        Ok(())
    }
}
