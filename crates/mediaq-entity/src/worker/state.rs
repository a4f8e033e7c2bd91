//! Worker lifecycle states.

use serde::{Deserialize, Serialize};
use std::fmt;

use mediaq_core::types::JobId;

/// Lifecycle state of a worker occupying a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    /// Waiting for a job.
    Idle,
    /// Executing a job.
    Busy,
    /// Exiting voluntarily after reaching its task quota.
    Recycling,
    /// Exited abnormally (panic, fatal error, or hard-limit kill).
    Crashed,
}

impl WorkerState {
    /// Return the state as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Busy => "busy",
            Self::Recycling => "recycling",
            Self::Crashed => "crashed",
        }
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a worker left its slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerExit {
    /// Task quota reached.
    Recycled {
        /// Jobs completed by the worker.
        tasks_completed: u32,
    },
    /// The worker stopped because shutdown was requested.
    Shutdown,
    /// The worker panicked or returned a fatal error.
    Crashed {
        /// Panic message or error text.
        reason: String,
    },
    /// The supervisor terminated the worker at the hard limit.
    HardTimeout {
        /// Job that was running.
        job_id: JobId,
    },
}

impl WorkerExit {
    /// Whether the exit counts toward the crash-loop burst.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Crashed { .. } | Self::HardTimeout { .. })
    }

    /// State the slot is left in after this exit.
    pub fn final_state(&self) -> WorkerState {
        match self {
            Self::Recycled { .. } | Self::Shutdown => WorkerState::Recycling,
            Self::Crashed { .. } | Self::HardTimeout { .. } => WorkerState::Crashed,
        }
    }
}

/// Point-in-time view of one worker slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotSnapshot {
    /// Slot index, stable across restarts.
    pub slot_id: usize,
    /// Incremented each time a worker is started in the slot.
    pub generation: u64,
    /// State of the current worker.
    pub state: WorkerState,
    /// Jobs completed by the current worker.
    pub tasks_completed: u32,
    /// Job the current worker is executing.
    pub current_job: Option<JobId>,
    /// Restarts counted in the current window.
    pub restarts_in_window: u32,
    /// Whether the supervisor has given up on the slot.
    pub disabled: bool,
}

impl SlotSnapshot {
    /// Snapshot of a freshly created slot.
    pub fn new(slot_id: usize) -> Self {
        Self {
            slot_id,
            generation: 0,
            state: WorkerState::Idle,
            tasks_completed: 0,
            current_job: None,
            restarts_in_window: 0,
            disabled: false,
        }
    }
}
