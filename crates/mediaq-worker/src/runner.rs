//! Worker runner: one slot's loop that dequeues jobs and executes them.
//!
//! The runner enforces the soft time limit itself by cancelling the job's
//! token. The hard limit is enforced from outside by the supervisor, which
//! reads the deadline the runner publishes on its status channel. Job
//! bodies run on a host (see [`crate::host`]) so the runner itself never
//! blocks.
//!
//! A soft-limit cancel only requeues the job when the body reports it was
//! cut short (`Cancelled` or an error). A body that wraps up and reports
//! `Completed` is acked.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing;

use mediaq_core::config::processing::ProcessingConfig;
use mediaq_core::config::worker::WorkerConfig;
use mediaq_core::types::JobId;
use mediaq_entity::job::{Job, JobStatus};
use mediaq_entity::worker::{WorkerExit, WorkerState};

use crate::executor::{JobExecutionError, JobExecutor, JobOutcome};
use crate::host;
use crate::queue::JobQueue;

/// Live status a runner publishes to its supervisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotStatus {
    /// Current lifecycle state
    pub state: WorkerState,
    /// Jobs finished by this runner
    pub tasks_completed: u32,
    /// Job being executed
    pub current_job: Option<JobId>,
    /// When the current job must be killed
    pub hard_deadline: Option<Instant>,
}

impl SlotStatus {
    /// Status of a runner that has not taken a job yet.
    pub fn idle() -> Self {
        Self {
            state: WorkerState::Idle,
            tasks_completed: 0,
            current_job: None,
            hard_deadline: None,
        }
    }
}

/// Executes jobs for one worker slot until recycled or shut down
#[derive(Debug)]
pub struct WorkerRunner {
    /// Slot this runner occupies
    slot_id: usize,
    /// Incarnation of the slot
    generation: u64,
    /// Job queue for polling
    queue: JobQueue,
    /// Job executor for dispatching
    executor: Arc<JobExecutor>,
    /// Worker limits
    config: WorkerConfig,
    /// Retry policy for requeued jobs
    processing: ProcessingConfig,
    /// Status channel read by the supervisor
    status: watch::Sender<SlotStatus>,
}

impl WorkerRunner {
    /// Create a new worker runner
    pub fn new(
        slot_id: usize,
        generation: u64,
        queue: JobQueue,
        executor: Arc<JobExecutor>,
        config: WorkerConfig,
        processing: ProcessingConfig,
        status: watch::Sender<SlotStatus>,
    ) -> Self {
        Self {
            slot_id,
            generation,
            queue,
            executor,
            config,
            processing,
            status,
        }
    }

    /// Run until the task quota is reached or `shutdown` fires
    pub async fn run(self, shutdown: CancellationToken) -> WorkerExit {
        tracing::info!(
            slot = self.slot_id,
            generation = self.generation,
            max_tasks = self.config.max_tasks_per_child,
            "Worker started"
        );

        let mut tasks_completed = 0u32;

        loop {
            if tasks_completed >= self.config.max_tasks_per_child {
                self.status.send_modify(|s| s.state = WorkerState::Recycling);
                tracing::info!(
                    slot = self.slot_id,
                    generation = self.generation,
                    tasks_completed,
                    "Worker reached task quota, recycling"
                );
                return WorkerExit::Recycled { tasks_completed };
            }

            if shutdown.is_cancelled() {
                tracing::info!(slot = self.slot_id, "Worker received shutdown signal");
                return WorkerExit::Shutdown;
            }

            let job = match self
                .queue
                .dequeue(self.config.dequeue_timeout(), &shutdown)
                .await
            {
                Ok(Some(job)) => job,
                Ok(None) => continue,
                Err(e) => {
                    tracing::error!(slot = self.slot_id, error = %e, "Failed to dequeue job");
                    tokio::select! {
                        _ = shutdown.cancelled() => {}
                        _ = tokio::time::sleep(Duration::from_secs(1)) => {}
                    }
                    continue;
                }
            };

            self.process(job, &shutdown).await;
            tasks_completed += 1;
            self.status.send_modify(|s| {
                s.state = WorkerState::Idle;
                s.tasks_completed = tasks_completed;
                s.current_job = None;
                s.hard_deadline = None;
            });
        }
    }

    /// Execute one claimed job and settle it with the broker
    async fn process(&self, mut job: Job, shutdown: &CancellationToken) {
        if job.is_exhausted() {
            let reason = format!("Gave up after {} attempts", job.attempts);
            self.exhaust(&mut job, &reason, shutdown).await;
            return;
        }

        let hard_limit = self.config.hard_time_limit();
        if let Err(e) = job.start(Utc::now(), hard_limit) {
            tracing::warn!(job_id = %job.id, error = %e, "Unexpected job state at start");
        }
        let job_id = job.id;
        self.status.send_modify(|s| {
            s.state = WorkerState::Busy;
            s.current_job = Some(job_id);
            s.hard_deadline = Some(Instant::now() + hard_limit);
        });

        tracing::info!(
            slot = self.slot_id,
            job_id = %job.id,
            kind = %job.kind(),
            attempt = job.attempts + 1,
            max_attempts = job.max_attempts,
            "Job claimed"
        );

        let soft = CancellationToken::new();
        let hosted = {
            let body = host::run_body(
                self.config.job_isolation,
                self.slot_id,
                Arc::clone(&self.executor),
                job.clone(),
                soft.clone(),
            );
            tokio::pin!(body);

            tokio::select! {
                res = &mut body => res,
                _ = tokio::time::sleep(self.config.soft_time_limit()) => {
                    tracing::warn!(
                        slot = self.slot_id,
                        job_id = %job.id,
                        soft_limit_secs = self.config.soft_time_limit_seconds,
                        "Soft time limit reached, cancelling job"
                    );
                    soft.cancel();
                    body.await
                }
            }
        };

        let result = match hosted {
            Ok(result) => result,
            // Crash this worker the same way an inline panic would.
            Err(panic) => std::panic::resume_unwind(panic),
        };

        self.settle(job, result, soft.is_cancelled(), shutdown).await;
    }

    async fn settle(
        &self,
        mut job: Job,
        result: Result<JobOutcome, JobExecutionError>,
        soft_fired: bool,
        shutdown: &CancellationToken,
    ) {
        match result {
            Ok(JobOutcome::Completed(summary)) => {
                self.finish(&mut job, JobStatus::Succeeded);
                if soft_fired {
                    tracing::info!(
                        job_id = %job.id,
                        kind = %job.kind(),
                        result = %summary,
                        "Job stopped early at soft time limit"
                    );
                } else {
                    tracing::info!(job_id = %job.id, kind = %job.kind(), result = %summary, "Job completed");
                }
                self.ack(&job, shutdown).await;
            }
            Ok(JobOutcome::Discarded(reason)) => {
                self.finish(&mut job, JobStatus::Succeeded);
                tracing::info!(job_id = %job.id, reason = %reason, "Job discarded");
                self.ack(&job, shutdown).await;
            }
            Ok(JobOutcome::Cancelled) => {
                self.finish(&mut job, JobStatus::TimedOut);
                tracing::warn!(job_id = %job.id, attempt = job.attempts + 1, "Job timed out");
                self.requeue_or_exhaust(job, "Soft time limit exceeded", shutdown)
                    .await;
            }
            Err(e) if soft_fired => {
                self.finish(&mut job, JobStatus::TimedOut);
                tracing::warn!(
                    job_id = %job.id,
                    attempt = job.attempts + 1,
                    error = %e,
                    "Job timed out"
                );
                self.requeue_or_exhaust(job, "Soft time limit exceeded", shutdown)
                    .await;
            }
            Err(e) if !e.is_retryable() => {
                self.finish(&mut job, JobStatus::Failed);
                tracing::error!(job_id = %job.id, error = %e, "Job failed permanently");
                self.ack(&job, shutdown).await;
            }
            Err(e) => {
                self.finish(&mut job, JobStatus::Failed);
                tracing::warn!(job_id = %job.id, attempt = job.attempts + 1, error = %e, "Job failed");
                self.requeue_or_exhaust(job, &e.to_string(), shutdown).await;
            }
        }
    }

    fn finish(&self, job: &mut Job, status: JobStatus) {
        if let Err(e) = job.transition(status) {
            tracing::warn!(job_id = %job.id, error = %e, "Unexpected job transition");
        }
    }

    async fn requeue_or_exhaust(&self, mut job: Job, reason: &str, shutdown: &CancellationToken) {
        if job.can_requeue() {
            let delay = self.processing.retry_delay(job.attempts);
            tracing::info!(
                job_id = %job.id,
                delay_secs = delay.as_secs(),
                "Requeueing job"
            );
            if let Err(e) = self.queue.nack(job.id, delay, shutdown).await {
                tracing::error!(job_id = %job.id, error = %e, "Failed to nack job");
            }
        } else {
            self.exhaust(&mut job, reason, shutdown).await;
        }
    }

    async fn exhaust(&self, job: &mut Job, reason: &str, shutdown: &CancellationToken) {
        if !job.status.is_terminal() {
            self.finish(job, JobStatus::Failed);
        }
        tracing::warn!(
            job_id = %job.id,
            attempts = job.attempts,
            max_attempts = job.max_attempts,
            "Job attempts exhausted"
        );
        if let Err(e) = self.executor.exhausted(job, reason).await {
            tracing::error!(job_id = %job.id, error = %e, "Exhaustion hook failed");
        }
        self.ack(job, shutdown).await;
    }

    async fn ack(&self, job: &Job, shutdown: &CancellationToken) {
        if let Err(e) = self.queue.ack(job.id, shutdown).await {
            tracing::error!(job_id = %job.id, error = %e, "Failed to ack job");
        }
    }
}
