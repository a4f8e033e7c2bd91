//! Worker restart policy.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Restart policy applied by the supervisor to every worker slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// Delay before a replacement worker is started.
    #[serde(default = "default_restart_delay")]
    pub restart_delay_seconds: u64,
    /// Length of the sliding window used to count restarts.
    #[serde(default = "default_restart_window")]
    pub restart_window_seconds: u64,
    /// Restarts tolerated inside one window before the slot is disabled.
    #[serde(default = "default_burst_limit")]
    pub burst_limit: u32,
}

impl SupervisorConfig {
    /// Restart delay as a [`Duration`].
    pub fn restart_delay(&self) -> Duration {
        Duration::from_secs(self.restart_delay_seconds)
    }

    /// Restart window as a [`Duration`].
    pub fn restart_window(&self) -> Duration {
        Duration::from_secs(self.restart_window_seconds)
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            restart_delay_seconds: default_restart_delay(),
            restart_window_seconds: default_restart_window(),
            burst_limit: default_burst_limit(),
        }
    }
}

fn default_restart_delay() -> u64 {
    10
}

fn default_restart_window() -> u64 {
    200
}

fn default_burst_limit() -> u32 {
    5
}
