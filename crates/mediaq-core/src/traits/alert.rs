//! Operational alerting surface.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::result::AppResult;

/// Alert severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    /// Degraded but self-healing.
    Warning,
    /// Needs an operator.
    Fatal,
}

/// An operational alert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    /// Machine-readable alert code (e.g. `"crash_loop_detected"`).
    pub code: String,
    /// Severity.
    pub severity: AlertSeverity,
    /// Worker slot the alert concerns, if any.
    pub slot: Option<usize>,
    /// Human-readable description.
    pub message: String,
    /// When the alert was raised.
    pub raised_at: DateTime<Utc>,
}

impl Alert {
    /// Create a fatal alert for a worker slot.
    pub fn fatal(code: impl Into<String>, slot: usize, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            severity: AlertSeverity::Fatal,
            slot: Some(slot),
            message: message.into(),
            raised_at: Utc::now(),
        }
    }
}

/// Destination for operational alerts.
#[async_trait]
pub trait AlertSink: Send + Sync + std::fmt::Debug + 'static {
    /// Deliver an alert.
    async fn raise(&self, alert: Alert) -> AppResult<()>;
}
