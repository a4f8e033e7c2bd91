//! Per-slot restart accounting.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

/// Outcome of recording a restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartDecision {
    /// Start a replacement worker.
    Restart,
    /// Too many restarts in the window; stop restarting and alert.
    CrashLoop,
}

/// Restart history for one slot.
///
/// The window slides: only restarts within `window` of the latest one count
/// toward the burst limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorRecord {
    /// Restarts counted in the current window.
    pub restart_count_in_window: u32,
    /// Oldest restart still inside the window.
    pub window_start: Option<Instant>,
    /// Restart times inside the window, oldest first.
    restarts: VecDeque<Instant>,
}

impl SupervisorRecord {
    /// A record with no restarts.
    pub fn new() -> Self {
        Self {
            restart_count_in_window: 0,
            window_start: None,
            restarts: VecDeque::new(),
        }
    }

    /// Count a restart at `now` and decide whether it may proceed.
    pub fn record_restart(
        &mut self,
        now: Instant,
        window: Duration,
        burst_limit: u32,
    ) -> RestartDecision {
        while self
            .restarts
            .front()
            .is_some_and(|at| now.saturating_duration_since(*at) > window)
        {
            self.restarts.pop_front();
        }
        self.restarts.push_back(now);

        self.restart_count_in_window = u32::try_from(self.restarts.len()).unwrap_or(u32::MAX);
        self.window_start = self.restarts.front().copied();

        if self.restart_count_in_window > burst_limit {
            RestartDecision::CrashLoop
        } else {
            RestartDecision::Restart
        }
    }
}

impl Default for SupervisorRecord {
    fn default() -> Self {
        Self::new()
    }
}
