//! Job status enumeration and transition rules.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of one delivery of a job.
///
/// Within a delivery the status only moves forward:
/// `Pending -> Claimed -> Running -> {Succeeded | Failed | TimedOut}`.
/// A requeue starts a new delivery back at `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Visible in the broker, waiting for a worker.
    Pending,
    /// Dequeued by a worker, hidden from other consumers.
    Claimed,
    /// The job body is executing.
    Running,
    /// The body finished and the job was acked.
    Succeeded,
    /// The body failed and will not be retried in this delivery.
    Failed,
    /// The soft or hard time limit was exceeded.
    TimedOut,
}

impl JobStatus {
    /// Check if the delivery is finished.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::TimedOut)
    }

    /// Check whether `next` is a legal forward step from this status.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Claimed)
                | (Self::Claimed, Self::Running)
                | (Self::Claimed, Self::Failed)
                | (Self::Running, Self::Succeeded)
                | (Self::Running, Self::Failed)
                | (Self::Running, Self::TimedOut)
        )
    }

    /// Return the status as a snake_case string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Claimed => "claimed",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::TimedOut => "timed_out",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions() {
        assert!(JobStatus::Pending.can_transition_to(JobStatus::Claimed));
        assert!(JobStatus::Claimed.can_transition_to(JobStatus::Running));
        assert!(JobStatus::Running.can_transition_to(JobStatus::TimedOut));
    }

    #[test]
    fn test_no_backward_or_skipping_transitions() {
        assert!(!JobStatus::Running.can_transition_to(JobStatus::Pending));
        assert!(!JobStatus::Pending.can_transition_to(JobStatus::Running));
        assert!(!JobStatus::Succeeded.can_transition_to(JobStatus::Failed));
        assert!(!JobStatus::TimedOut.can_transition_to(JobStatus::Succeeded));
    }
}
