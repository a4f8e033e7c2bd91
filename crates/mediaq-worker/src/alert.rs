//! Alert sink that writes alerts to the tracing pipeline.

use async_trait::async_trait;
use tracing;

use mediaq_core::result::AppResult;
use mediaq_core::traits::{Alert, AlertSeverity, AlertSink};

/// Emits every alert as a structured log event
#[derive(Debug, Clone, Copy, Default)]
pub struct LogAlertSink;

#[async_trait]
impl AlertSink for LogAlertSink {
    async fn raise(&self, alert: Alert) -> AppResult<()> {
        match alert.severity {
            AlertSeverity::Fatal => tracing::error!(
                alert = %alert.code,
                slot = ?alert.slot,
                raised_at = %alert.raised_at,
                "{}",
                alert.message
            ),
            AlertSeverity::Warning => tracing::warn!(
                alert = %alert.code,
                slot = ?alert.slot,
                raised_at = %alert.raised_at,
                "{}",
                alert.message
            ),
        }
        Ok(())
    }
}
