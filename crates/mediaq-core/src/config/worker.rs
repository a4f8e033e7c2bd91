//! Worker pool configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Worker pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Number of worker slots kept alive.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Jobs a worker completes before it is recycled.
    #[serde(default = "default_max_tasks_per_child")]
    pub max_tasks_per_child: u32,
    /// Seconds after which the running job receives a cancellation signal.
    #[serde(default = "default_soft_time_limit")]
    pub soft_time_limit_seconds: u64,
    /// Seconds after which the worker running the job is terminated.
    #[serde(default = "default_hard_time_limit")]
    pub hard_time_limit_seconds: u64,
    /// Longest a single dequeue call blocks waiting for work.
    #[serde(default = "default_dequeue_timeout")]
    pub dequeue_timeout_seconds: u64,
    /// How long shutdown waits for in-flight jobs before aborting workers.
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_seconds: u64,
    /// Where job bodies run.
    #[serde(default)]
    pub job_isolation: JobIsolation,
}

/// Where a worker runs the body of each job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobIsolation {
    /// A dedicated OS thread per job. A body stuck in blocking code is
    /// abandoned at the hard limit instead of holding a runtime thread.
    #[default]
    Thread,
    /// A task on the worker's own runtime. Only bodies that yield can be
    /// stopped at the hard limit.
    Task,
}

impl WorkerConfig {
    /// Soft time limit as a [`Duration`].
    pub fn soft_time_limit(&self) -> Duration {
        Duration::from_secs(self.soft_time_limit_seconds)
    }

    /// Hard time limit as a [`Duration`].
    pub fn hard_time_limit(&self) -> Duration {
        Duration::from_secs(self.hard_time_limit_seconds)
    }

    /// Dequeue wait as a [`Duration`].
    pub fn dequeue_timeout(&self) -> Duration {
        Duration::from_secs(self.dequeue_timeout_seconds)
    }

    /// Shutdown grace period as a [`Duration`].
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_seconds)
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            max_tasks_per_child: default_max_tasks_per_child(),
            soft_time_limit_seconds: default_soft_time_limit(),
            hard_time_limit_seconds: default_hard_time_limit(),
            dequeue_timeout_seconds: default_dequeue_timeout(),
            shutdown_grace_seconds: default_shutdown_grace(),
            job_isolation: JobIsolation::default(),
        }
    }
}

fn default_concurrency() -> usize {
    2
}

fn default_max_tasks_per_child() -> u32 {
    50
}

fn default_soft_time_limit() -> u64 {
    240
}

fn default_hard_time_limit() -> u64 {
    300
}

fn default_dequeue_timeout() -> u64 {
    5
}

fn default_shutdown_grace() -> u64 {
    30
}
