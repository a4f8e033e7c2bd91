//! Supervisor that owns worker slots, enforces hard limits and restarts
//! workers with a delay and a crash-loop burst limit.

use std::any::Any;
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing;

use mediaq_core::config::AppConfig;
use mediaq_core::config::processing::ProcessingConfig;
use mediaq_core::config::supervisor::SupervisorConfig;
use mediaq_core::config::worker::WorkerConfig;
use mediaq_core::traits::{Alert, AlertSink};
use mediaq_entity::worker::{
    RestartDecision, SlotSnapshot, SupervisorRecord, WorkerExit, WorkerState,
};

use crate::executor::JobExecutor;
use crate::queue::JobQueue;
use crate::runner::{SlotStatus, WorkerRunner};

/// Alert code raised when a slot is disabled.
pub const CRASH_LOOP_ALERT: &str = "crash_loop_detected";

/// Runs `concurrency` worker slots and keeps them alive
#[derive(Debug)]
pub struct Supervisor {
    /// Job queue shared by every runner
    queue: JobQueue,
    /// Job executor shared by every runner
    executor: Arc<JobExecutor>,
    /// Where crash-loop alerts go
    alerts: Arc<dyn AlertSink>,
    /// Worker limits
    worker: WorkerConfig,
    /// Restart policy
    policy: SupervisorConfig,
    /// Retry policy handed to runners
    processing: ProcessingConfig,
    /// Latest view of each slot
    slots: Mutex<Vec<SlotSnapshot>>,
}

impl Supervisor {
    /// Create a new supervisor
    pub fn new(
        queue: JobQueue,
        executor: Arc<JobExecutor>,
        alerts: Arc<dyn AlertSink>,
        config: &AppConfig,
    ) -> Self {
        let slots = (0..config.worker.concurrency)
            .map(SlotSnapshot::new)
            .collect();
        Self {
            queue,
            executor,
            alerts,
            worker: config.worker.clone(),
            policy: config.supervisor.clone(),
            processing: config.processing.clone(),
            slots: Mutex::new(slots),
        }
    }

    /// Current state of every slot
    pub fn snapshot(&self) -> Vec<SlotSnapshot> {
        self.slots
            .lock()
            .map(|slots| slots.clone())
            .unwrap_or_default()
    }

    /// Run every slot until `shutdown` fires and all workers have left
    pub async fn run(&self, shutdown: CancellationToken) {
        tracing::info!(
            concurrency = self.worker.concurrency,
            soft_limit_secs = self.worker.soft_time_limit_seconds,
            hard_limit_secs = self.worker.hard_time_limit_seconds,
            max_tasks_per_child = self.worker.max_tasks_per_child,
            "Supervisor started"
        );

        let slots = (0..self.worker.concurrency).map(|slot| self.supervise(slot, &shutdown));
        futures::future::join_all(slots).await;

        tracing::info!("Supervisor stopped");
    }

    fn update_slot(&self, slot_id: usize, f: impl FnOnce(&mut SlotSnapshot)) {
        if let Ok(mut slots) = self.slots.lock() {
            if let Some(slot) = slots.get_mut(slot_id) {
                f(slot);
            }
        }
    }

    async fn supervise(&self, slot_id: usize, shutdown: &CancellationToken) {
        let mut record = SupervisorRecord::new();
        let mut generation = 0u64;

        while !shutdown.is_cancelled() {
            generation += 1;
            let (status_tx, status_rx) = watch::channel(SlotStatus::idle());
            let runner = WorkerRunner::new(
                slot_id,
                generation,
                self.queue.clone(),
                Arc::clone(&self.executor),
                self.worker.clone(),
                self.processing.clone(),
                status_tx,
            );
            let handle = tokio::spawn(runner.run(shutdown.child_token()));
            self.update_slot(slot_id, |s| {
                s.generation = generation;
                s.state = WorkerState::Idle;
                s.tasks_completed = 0;
                s.current_job = None;
            });

            let exit = self.watch(slot_id, handle, status_rx, shutdown).await;
            self.update_slot(slot_id, |s| {
                s.state = exit.final_state();
                s.current_job = None;
            });

            match &exit {
                WorkerExit::Shutdown => break,
                WorkerExit::Recycled { tasks_completed } => {
                    tracing::info!(slot = slot_id, generation, tasks_completed, "Worker recycled");
                }
                WorkerExit::Crashed { reason } => {
                    tracing::error!(slot = slot_id, generation, reason = %reason, "Worker crashed");
                }
                WorkerExit::HardTimeout { job_id } => {
                    tracing::error!(
                        slot = slot_id,
                        generation,
                        job_id = %job_id,
                        "Worker killed at hard time limit"
                    );
                }
            }

            if exit.is_failure() {
                let decision = record.record_restart(
                    Instant::now(),
                    self.policy.restart_window(),
                    self.policy.burst_limit,
                );
                let restarts = record.restart_count_in_window;
                self.update_slot(slot_id, |s| s.restarts_in_window = restarts);

                if decision == RestartDecision::CrashLoop {
                    self.disable(slot_id, restarts).await;
                    return;
                }
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.policy.restart_delay()) => {}
            }
            tracing::info!(slot = slot_id, generation = generation + 1, "Worker restarted");
        }

        tracing::info!(slot = slot_id, "Slot stopped");
    }

    async fn disable(&self, slot_id: usize, restarts: u32) {
        self.update_slot(slot_id, |s| s.disabled = true);

        let message = format!(
            "Worker slot {} failed {} times within {}s, giving up",
            slot_id, restarts, self.policy.restart_window_seconds
        );
        tracing::error!(slot = slot_id, restarts, "Crash loop detected, slot disabled");

        if let Err(e) = self
            .alerts
            .raise(Alert::fatal(CRASH_LOOP_ALERT, slot_id, message))
            .await
        {
            tracing::error!(slot = slot_id, error = %e, "Failed to raise crash-loop alert");
        }
    }

    /// Wait for the worker to leave, killing it at its hard deadline or at
    /// the end of the shutdown grace period. A killed worker is not waited
    /// for.
    async fn watch(
        &self,
        slot_id: usize,
        mut handle: JoinHandle<WorkerExit>,
        mut status: watch::Receiver<SlotStatus>,
        shutdown: &CancellationToken,
    ) -> WorkerExit {
        let mut status_open = true;
        let mut grace_deadline: Option<Instant> = None;

        loop {
            let current = status.borrow_and_update().clone();
            self.update_slot(slot_id, |s| {
                s.state = current.state;
                s.tasks_completed = current.tasks_completed;
                s.current_job = current.current_job;
            });

            let hard = sleep_until_opt(current.hard_deadline);
            let grace = sleep_until_opt(grace_deadline);

            tokio::select! {
                res = &mut handle => return exit_from_join(res),
                changed = status.changed(), if status_open => {
                    if changed.is_err() {
                        status_open = false;
                    }
                }
                _ = hard => {
                    if handle.is_finished() {
                        return exit_from_join((&mut handle).await);
                    }
                    // The body may never yield; leave it behind and replace
                    // the worker now.
                    handle.abort();
                    return match current.current_job {
                        Some(job_id) => WorkerExit::HardTimeout { job_id },
                        None => WorkerExit::Crashed {
                            reason: "hard deadline without a job".to_string(),
                        },
                    };
                }
                _ = shutdown.cancelled(), if grace_deadline.is_none() => {
                    tracing::info!(
                        slot = slot_id,
                        grace_secs = self.worker.shutdown_grace_seconds,
                        "Waiting for in-flight job"
                    );
                    grace_deadline = Some(Instant::now() + self.worker.shutdown_grace());
                }
                _ = grace => {
                    tracing::warn!(slot = slot_id, "Shutdown grace elapsed, aborting worker");
                    handle.abort();
                    return WorkerExit::Shutdown;
                }
            }
        }
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

fn exit_from_join(res: Result<WorkerExit, JoinError>) -> WorkerExit {
    match res {
        Ok(exit) => exit,
        Err(e) if e.is_panic() => WorkerExit::Crashed {
            reason: panic_message(e.into_panic()),
        },
        Err(e) => WorkerExit::Crashed {
            reason: e.to_string(),
        },
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "worker panicked".to_string()
    }
}
