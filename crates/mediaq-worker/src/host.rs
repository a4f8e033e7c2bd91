//! Hosts that run a job body away from the worker's own task.
//!
//! The worker awaits the host, so it always sits at an await point and the
//! supervisor can abort it at the hard limit. Dropping the host future
//! cancels `kill`, which drops the body wherever it can still be dropped.
//! A thread-hosted body that never yields is left to finish on its own
//! thread.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing;

use mediaq_core::config::worker::JobIsolation;
use mediaq_core::error::AppError;
use mediaq_entity::job::Job;

use crate::executor::{JobExecutionError, JobExecutor, JobOutcome};

/// Result of a job body.
pub type BodyResult = Result<JobOutcome, JobExecutionError>;

/// Panic payload of a body that panicked.
pub type BodyPanic = Box<dyn Any + Send + 'static>;

/// Run `job` on the host selected by `isolation`.
pub async fn run_body(
    isolation: JobIsolation,
    slot_id: usize,
    executor: Arc<JobExecutor>,
    job: Job,
    soft: CancellationToken,
) -> Result<BodyResult, BodyPanic> {
    let kill = CancellationToken::new();
    let _kill_on_drop = kill.clone().drop_guard();

    match isolation {
        JobIsolation::Thread => on_thread(slot_id, executor, job, soft, kill).await,
        JobIsolation::Task => on_task(executor, job, soft, kill).await,
    }
}

async fn body(
    executor: &JobExecutor,
    job: &Job,
    soft: CancellationToken,
    kill: &CancellationToken,
) -> Option<BodyResult> {
    tokio::select! {
        res = executor.execute(job, soft) => Some(res),
        _ = kill.cancelled() => None,
    }
}

fn killed(job: &Job) -> BodyResult {
    Err(JobExecutionError::Internal(AppError::internal(format!(
        "Body of job {} was stopped before it finished",
        job.id
    ))))
}

async fn on_thread(
    slot_id: usize,
    executor: Arc<JobExecutor>,
    job: Job,
    soft: CancellationToken,
    kill: CancellationToken,
) -> Result<BodyResult, BodyPanic> {
    let (tx, rx) = oneshot::channel::<Result<BodyResult, BodyPanic>>();
    let job_id = job.id;
    let thread_job = job.clone();

    let spawned = std::thread::Builder::new()
        .name(format!("mediaq-slot-{slot_id}"))
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    let _ = tx.send(Ok(Err(JobExecutionError::Internal(AppError::internal(
                        format!("Failed to build job runtime: {e}"),
                    )))));
                    return;
                }
            };

            let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| {
                runtime.block_on(body(&executor, &thread_job, soft, &kill))
            }));

            let sent = match outcome {
                Ok(Some(res)) => tx.send(Ok(res)),
                Ok(None) => {
                    tracing::debug!(job_id = %thread_job.id, "Abandoned job body stopped");
                    return;
                }
                Err(panic) => tx.send(Err(panic)),
            };
            if sent.is_err() {
                tracing::warn!(
                    job_id = %thread_job.id,
                    "Job body finished after its worker was replaced"
                );
            }
        });

    if let Err(e) = spawned {
        return Ok(Err(JobExecutionError::Internal(AppError::internal(
            format!("Failed to start job thread: {e}"),
        ))));
    }

    match rx.await {
        Ok(res) => res,
        Err(_) => {
            tracing::error!(job_id = %job_id, "Job thread exited without a result");
            Ok(killed(&job))
        }
    }
}

async fn on_task(
    executor: Arc<JobExecutor>,
    job: Job,
    soft: CancellationToken,
    kill: CancellationToken,
) -> Result<BodyResult, BodyPanic> {
    let task_job = job.clone();
    let handle =
        tokio::spawn(async move { body(&executor, &task_job, soft, &kill).await });

    match handle.await {
        Ok(Some(res)) => Ok(res),
        Ok(None) => Ok(killed(&job)),
        Err(e) if e.is_panic() => Err(e.into_panic()),
        Err(e) => Ok(Err(JobExecutionError::Internal(AppError::internal(
            format!("Job task failed: {e}"),
        )))),
    }
}
