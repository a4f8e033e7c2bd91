//! Worker slot and supervisor bookkeeping.

pub mod record;
pub mod state;

pub use record::{RestartDecision, SupervisorRecord};
pub use state::{SlotSnapshot, WorkerExit, WorkerState};
