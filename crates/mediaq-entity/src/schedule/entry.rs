//! Schedule entry model.

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use mediaq_core::config::scheduler::ScheduleEntryConfig;
use mediaq_core::error::AppError;
use mediaq_core::types::MediaKind;

use crate::job::JobPayload;

/// A daily batch-discovery fire time. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    /// Stable name of the entry.
    pub id: String,
    /// UTC time of day the entry fires.
    pub fire_time: NaiveTime,
    /// Media kind to discover.
    pub batch_kind: MediaKind,
    /// Maximum number of items per run.
    pub batch_size_limit: usize,
}

impl ScheduleEntry {
    /// Build an entry from its configuration row.
    pub fn from_config(config: &ScheduleEntryConfig) -> Result<Self, AppError> {
        Ok(Self {
            id: config.id.clone(),
            fire_time: config.parse_fire_time()?,
            batch_kind: config.kind,
            batch_size_limit: config.batch_size_limit,
        })
    }

    /// Whether `now` falls in the entry's fire minute.
    pub fn is_due(&self, now: NaiveTime) -> bool {
        now.hour() == self.fire_time.hour() && now.minute() == self.fire_time.minute()
    }

    /// Payload of the discovery job this entry emits.
    pub fn payload(&self) -> JobPayload {
        JobPayload::BatchDiscovery {
            media_kind: self.batch_kind,
            batch_size_limit: self.batch_size_limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> ScheduleEntry {
        ScheduleEntry::from_config(&ScheduleEntryConfig {
            id: "photos".to_string(),
            fire_time: "02:00".to_string(),
            kind: MediaKind::Photo,
            batch_size_limit: 500,
        })
        .unwrap()
    }

    #[test]
    fn test_due_for_whole_minute() {
        let entry = entry();
        assert!(entry.is_due(NaiveTime::from_hms_opt(2, 0, 0).unwrap()));
        assert!(entry.is_due(NaiveTime::from_hms_opt(2, 0, 59).unwrap()));
        assert!(!entry.is_due(NaiveTime::from_hms_opt(2, 1, 0).unwrap()));
        assert!(!entry.is_due(NaiveTime::from_hms_opt(14, 0, 0).unwrap()));
    }

    #[test]
    fn test_invalid_fire_time_rejected() {
        let err = ScheduleEntry::from_config(&ScheduleEntryConfig {
            id: "bad".to_string(),
            fire_time: "2am".to_string(),
            kind: MediaKind::Video,
            batch_size_limit: 1,
        });
        assert!(err.is_err());
    }
}
