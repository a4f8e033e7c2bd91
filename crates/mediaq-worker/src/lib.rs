//! Background job processing and daily scheduling for MediaQ.
//!
//! This crate provides:
//! - A retrying job queue over the configured broker
//! - A job executor that dispatches jobs to the correct handler
//! - Batch-discovery and item-process job handlers
//! - Worker runners with soft time limits and task quotas
//! - A supervisor enforcing hard limits and restarting workers
//! - A daily scheduler that fires batch-discovery jobs

pub mod alert;
pub mod executor;
pub mod host;
pub mod jobs;
pub mod queue;
pub mod runner;
pub mod scheduler;
pub mod supervisor;
pub mod work;

pub use alert::LogAlertSink;
pub use executor::{JobExecutionError, JobExecutor, JobHandler, JobOutcome};
pub use queue::{JobQueue, deadline};
pub use runner::WorkerRunner;
pub use scheduler::{Clock, DailyScheduler, SystemClock};
pub use supervisor::Supervisor;
pub use work::CommandWorkFunction;
