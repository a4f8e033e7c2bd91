//! Job entity model.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use mediaq_core::error::AppError;
use mediaq_core::types::JobId;

use super::payload::{JobKind, JobPayload};
use super::status::JobStatus;

/// A unit of work carried by the broker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    /// Unique job identifier.
    pub id: JobId,
    /// Job-specific payload. Its tag doubles as the job kind.
    pub payload: JobPayload,
    /// Status of the current delivery.
    pub status: JobStatus,
    /// Number of times the job has been requeued.
    pub attempts: u32,
    /// Requeue budget. A job with `attempts >= max_attempts` is never
    /// executed or requeued again.
    pub max_attempts: u32,
    /// When the job was first enqueued.
    pub enqueued_at: DateTime<Utc>,
    /// When the current delivery was claimed.
    pub claimed_at: Option<DateTime<Utc>>,
    /// Hard deadline of the current delivery, set when the body starts.
    pub deadline: Option<DateTime<Utc>>,
}

impl Job {
    /// Create a new pending job.
    pub fn new(payload: JobPayload, max_attempts: u32) -> Self {
        Self {
            id: JobId::new(),
            payload,
            status: JobStatus::Pending,
            attempts: 0,
            max_attempts,
            enqueued_at: Utc::now(),
            claimed_at: None,
            deadline: None,
        }
    }

    /// The job kind, derived from the payload.
    pub fn kind(&self) -> JobKind {
        self.payload.kind()
    }

    /// Move the current delivery forward, rejecting illegal steps.
    pub fn transition(&mut self, next: JobStatus) -> Result<(), AppError> {
        if !self.status.can_transition_to(next) {
            return Err(AppError::conflict(format!(
                "Job {} cannot move from {} to {}",
                self.id, self.status, next
            )));
        }
        self.status = next;
        Ok(())
    }

    /// Mark the job claimed by a consumer.
    pub fn claim(&mut self, now: DateTime<Utc>) -> Result<(), AppError> {
        self.transition(JobStatus::Claimed)?;
        self.claimed_at = Some(now);
        Ok(())
    }

    /// Mark the body started with the given hard limit.
    pub fn start(&mut self, now: DateTime<Utc>, hard_limit: Duration) -> Result<(), AppError> {
        self.transition(JobStatus::Running)?;
        self.deadline = chrono::Duration::from_std(hard_limit)
            .ok()
            .map(|limit| now + limit);
        Ok(())
    }

    /// Whether the requeue budget is spent.
    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }

    /// Whether one more requeue stays within budget.
    pub fn can_requeue(&self) -> bool {
        self.attempts.saturating_add(1) < self.max_attempts
    }

    /// Start a new delivery: back to pending with the attempt count bumped.
    pub fn requeued(mut self) -> Self {
        self.status = JobStatus::Pending;
        self.attempts = self.attempts.saturating_add(1);
        self.claimed_at = None;
        self.deadline = None;
        self
    }
}
