//! Job executor that dispatches jobs to registered handlers.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing;

use mediaq_core::error::AppError;
use mediaq_entity::job::{Job, JobKind};

/// How a handler finished a job that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    /// The work was done. Carries a JSON summary for logging.
    Completed(Value),
    /// There was nothing to do (e.g. the item was already claimed).
    Discarded(String),
    /// The body stopped early because the soft limit fired.
    Cancelled,
}

/// Trait for job handler implementations
#[async_trait]
pub trait JobHandler: Send + Sync + std::fmt::Debug {
    /// Get the job kind this handler processes
    fn job_kind(&self) -> JobKind;

    /// Execute the job. `cancel` fires when the soft time limit is reached.
    async fn execute(
        &self,
        job: &Job,
        cancel: CancellationToken,
    ) -> Result<JobOutcome, JobExecutionError>;

    /// Called instead of a requeue once the job's attempt budget is spent.
    async fn exhausted(&self, _job: &Job, _reason: &str) -> Result<(), JobExecutionError> {
        Ok(())
    }
}

/// Error from job execution
#[derive(Debug, thiserror::Error)]
pub enum JobExecutionError {
    /// Permanent failure, do not retry
    #[error("Permanent job failure: {0}")]
    Permanent(String),

    /// Transient failure, may retry
    #[error("Transient job failure: {0}")]
    Transient(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] AppError),
}

impl JobExecutionError {
    /// Whether the job should be requeued (budget permitting).
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Permanent(_))
    }
}

/// Dispatches jobs to the appropriate handler based on job kind
#[derive(Debug, Default)]
pub struct JobExecutor {
    /// Registered job handlers by kind
    handlers: HashMap<JobKind, Arc<dyn JobHandler>>,
}

impl JobExecutor {
    /// Create a new job executor
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a job handler
    pub fn register(&mut self, handler: Arc<dyn JobHandler>) {
        let kind = handler.job_kind();
        tracing::info!("Registered job handler for kind '{}'", kind);
        self.handlers.insert(kind, handler);
    }

    fn handler(&self, job: &Job) -> Result<&Arc<dyn JobHandler>, JobExecutionError> {
        self.handlers.get(&job.kind()).ok_or_else(|| {
            JobExecutionError::Permanent(format!(
                "No handler registered for job kind '{}'",
                job.kind()
            ))
        })
    }

    /// Execute a job by dispatching to the correct handler
    pub async fn execute(
        &self,
        job: &Job,
        cancel: CancellationToken,
    ) -> Result<JobOutcome, JobExecutionError> {
        let handler = self.handler(job)?;

        tracing::debug!(
            job_id = %job.id,
            kind = %job.kind(),
            attempt = job.attempts + 1,
            max_attempts = job.max_attempts,
            "Executing job"
        );

        handler.execute(job, cancel).await
    }

    /// Run the exhaustion hook of the job's handler
    pub async fn exhausted(&self, job: &Job, reason: &str) -> Result<(), JobExecutionError> {
        self.handler(job)?.exhausted(job, reason).await
    }

    /// Check if a handler is registered for a job kind
    pub fn has_handler(&self, kind: JobKind) -> bool {
        self.handlers.contains_key(&kind)
    }
}
