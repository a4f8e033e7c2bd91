//! Item processing and retry settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Item processing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Deliveries a job gets before it is terminally failed.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base delay for retrying a transient failure.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_seconds: u64,
    /// Cap on the exponential retry delay.
    #[serde(default = "default_max_retry_delay")]
    pub max_retry_delay_seconds: u64,
    /// Enqueue an item-process job as soon as an item is uploaded.
    #[serde(default)]
    pub auto_process_on_upload: bool,
    /// External command run per item. `{kind}` and `{id}` are substituted.
    #[serde(default = "default_command")]
    pub command: Vec<String>,
}

impl ProcessingConfig {
    /// Backoff before retry number `attempts + 1`.
    pub fn retry_delay(&self, attempts: u32) -> Duration {
        let base = self.retry_delay_seconds.max(1);
        let factor = 1u64.checked_shl(attempts.min(32)).unwrap_or(u64::MAX);
        let secs = base
            .saturating_mul(factor)
            .min(self.max_retry_delay_seconds.max(base));
        Duration::from_secs(secs)
    }
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_delay_seconds: default_retry_delay(),
            max_retry_delay_seconds: default_max_retry_delay(),
            auto_process_on_upload: false,
            command: default_command(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    60
}

fn default_max_retry_delay() -> u64 {
    3600
}

fn default_command() -> Vec<String> {
    vec![
        "mediaq-analyze".to_string(),
        "--kind".to_string(),
        "{kind}".to_string(),
        "--id".to_string(),
        "{id}".to_string(),
    ]
}
