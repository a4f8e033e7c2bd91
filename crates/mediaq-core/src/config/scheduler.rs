//! Daily batch-discovery schedule.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::types::MediaKind;

/// Scheduler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Whether scheduled discovery runs at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Seconds between fire attempts inside a fire minute, counted from
    /// second 0 (at most 60).
    #[serde(default = "default_tick")]
    pub tick_seconds: u64,
    /// Daily fire table.
    #[serde(default = "default_entries")]
    pub entries: Vec<ScheduleEntryConfig>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tick_seconds: default_tick(),
            entries: default_entries(),
        }
    }
}

/// One row of the fire table as written in configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleEntryConfig {
    /// Stable name of the entry.
    pub id: String,
    /// UTC time of day, `HH:MM` or `HH:MM:SS`.
    pub fire_time: String,
    /// Media kind the discovery job looks for.
    pub kind: MediaKind,
    /// Maximum number of items one discovery run enqueues.
    #[serde(default = "default_batch_size")]
    pub batch_size_limit: usize,
}

impl ScheduleEntryConfig {
    /// Parse `fire_time` into a time of day.
    pub fn parse_fire_time(&self) -> Result<NaiveTime, AppError> {
        parse_time_of_day(&self.fire_time).ok_or_else(|| {
            AppError::configuration(format!(
                "Schedule entry '{}' has invalid fire_time '{}' (expected HH:MM)",
                self.id, self.fire_time
            ))
        })
    }
}

/// Parse `HH:MM` or `HH:MM:SS`.
pub fn parse_time_of_day(value: &str) -> Option<NaiveTime> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .ok()
}

fn default_true() -> bool {
    true
}

fn default_tick() -> u64 {
    30
}

fn default_batch_size() -> usize {
    500
}

fn default_entries() -> Vec<ScheduleEntryConfig> {
    vec![
        ScheduleEntryConfig {
            id: "process-pending-photos-daily".to_string(),
            fire_time: "02:00".to_string(),
            kind: MediaKind::Photo,
            batch_size_limit: default_batch_size(),
        },
        ScheduleEntryConfig {
            id: "process-pending-videos-daily".to_string(),
            fire_time: "02:30".to_string(),
            kind: MediaKind::Video,
            batch_size_limit: default_batch_size(),
        },
    ]
}
