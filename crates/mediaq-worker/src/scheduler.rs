//! Daily scheduler that fires batch-discovery jobs at configured times.
//!
//! Each entry gets a cron job that wakes the scheduler on second-aligned
//! slots inside its fire minute (every `tick_seconds`, starting at :00).
//! On each wake the due entries are checked at minute resolution against
//! the injected clock. An entry fires at most once per calendar day; fires
//! missed while the process was down are skipped.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Timelike, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_cron_scheduler::{Job as CronJob, JobScheduler};
use tokio_util::sync::CancellationToken;
use tracing;

use mediaq_core::config::scheduler::SchedulerConfig;
use mediaq_core::error::AppError;
use mediaq_core::result::AppResult;
use mediaq_core::types::JobId;
use mediaq_entity::schedule::ScheduleEntry;

use crate::queue::JobQueue;

/// Source of wall-clock time
pub trait Clock: Send + Sync + std::fmt::Debug + 'static {
    /// Current UTC time
    fn now(&self) -> DateTime<Utc>;
}

/// The system clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Fires schedule entries once per day
#[derive(Debug)]
pub struct DailyScheduler {
    /// Fire table
    entries: Vec<ScheduleEntry>,
    /// Queue discovery jobs are published to
    queue: JobQueue,
    /// Wall clock
    clock: Arc<dyn Clock>,
    /// Spacing of wakes inside a fire minute
    tick: Duration,
    /// Last day each entry fired, by entry id
    fired: HashMap<String, NaiveDate>,
}

impl DailyScheduler {
    /// Create a new scheduler
    pub fn new(
        entries: Vec<ScheduleEntry>,
        queue: JobQueue,
        clock: Arc<dyn Clock>,
        tick: Duration,
    ) -> Self {
        Self {
            entries,
            queue,
            clock,
            tick,
            fired: HashMap::new(),
        }
    }

    /// Build the fire table from configuration
    pub fn from_config(
        config: &SchedulerConfig,
        queue: JobQueue,
        clock: Arc<dyn Clock>,
    ) -> AppResult<Self> {
        let entries = config
            .entries
            .iter()
            .map(ScheduleEntry::from_config)
            .collect::<AppResult<Vec<_>>>()?;
        Ok(Self::new(
            entries,
            queue,
            clock,
            Duration::from_secs(config.tick_seconds),
        ))
    }

    /// The fire table
    pub fn entries(&self) -> &[ScheduleEntry] {
        &self.entries
    }

    /// Fire every entry that is due and has not fired today. Returns the
    /// ids of the jobs enqueued.
    pub async fn tick(&mut self) -> Vec<JobId> {
        let now = self.clock.now();
        let today = now.date_naive();
        let time = now.time();
        let mut enqueued = Vec::new();

        for entry in &self.entries {
            if !entry.is_due(time) || self.fired.get(&entry.id) == Some(&today) {
                continue;
            }

            let job = self.queue.job(entry.payload());
            match self.queue.try_enqueue(job).await {
                Ok(job_id) => {
                    self.fired.insert(entry.id.clone(), today);
                    tracing::info!(
                        entry = %entry.id,
                        job_id = %job_id,
                        kind = %entry.batch_kind,
                        batch_size_limit = entry.batch_size_limit,
                        "Scheduled discovery fired"
                    );
                    enqueued.push(job_id);
                }
                Err(e) => {
                    tracing::error!(
                        entry = %entry.id,
                        error = %e,
                        "Failed to enqueue scheduled discovery, will retry next tick"
                    );
                }
            }
        }

        enqueued
    }

    /// Build and spawn the scheduler when `scheduler.enabled` is set.
    pub async fn start(
        config: &SchedulerConfig,
        queue: JobQueue,
        clock: Arc<dyn Clock>,
        shutdown: CancellationToken,
    ) -> AppResult<Option<JoinHandle<()>>> {
        if !config.enabled {
            tracing::info!("Scheduled discovery disabled");
            return Ok(None);
        }

        let scheduler = Self::from_config(config, queue, clock)?;
        for entry in scheduler.entries() {
            tracing::info!(
                entry = %entry.id,
                fire_time = %entry.fire_time,
                kind = %entry.batch_kind,
                batch_size_limit = entry.batch_size_limit,
                "Scheduled discovery registered"
            );
        }

        let (cron, wakes) = scheduler.register_cron().await?;
        Ok(Some(tokio::spawn(scheduler.run(cron, wakes, shutdown))))
    }

    /// Cron expression that wakes the scheduler for `entry`
    pub fn cron_expression(entry: &ScheduleEntry, tick: Duration) -> String {
        let step = usize::try_from(tick.as_secs().clamp(1, 60)).unwrap_or(60);
        let seconds = (0..60)
            .step_by(step)
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(",");
        format!(
            "{} {} {} * * *",
            seconds,
            entry.fire_time.minute(),
            entry.fire_time.hour()
        )
    }

    async fn register_cron(&self) -> AppResult<(JobScheduler, mpsc::Receiver<String>)> {
        let cron = JobScheduler::new()
            .await
            .map_err(|e| AppError::internal(format!("Failed to create scheduler: {}", e)))?;
        let (tx, rx) = mpsc::channel(self.entries.len().max(1) * 4);

        for entry in &self.entries {
            let expression = Self::cron_expression(entry, self.tick);
            let entry_id = entry.id.clone();
            let tx = tx.clone();
            let job = CronJob::new_async(expression.as_str(), move |_uuid, _lock| {
                let tx = tx.clone();
                let entry_id = entry_id.clone();
                Box::pin(async move {
                    // A full channel means a wake is already pending.
                    let _ = tx.try_send(entry_id);
                })
            })
            .map_err(|e| {
                AppError::internal(format!(
                    "Failed to create schedule for '{}' ({}): {}",
                    entry.id, expression, e
                ))
            })?;

            cron.add(job).await.map_err(|e| {
                AppError::internal(format!("Failed to add schedule for '{}': {}", entry.id, e))
            })?;
            tracing::debug!(entry = %entry.id, cron = %expression, "Registered cron wake");
        }

        cron.start()
            .await
            .map_err(|e| AppError::internal(format!("Failed to start scheduler: {}", e)))?;
        Ok((cron, rx))
    }

    /// Fire due entries on every cron wake until `shutdown` fires
    pub async fn run(
        mut self,
        mut cron: JobScheduler,
        mut wakes: mpsc::Receiver<String>,
        shutdown: CancellationToken,
    ) {
        tracing::info!(
            entries = self.entries.len(),
            tick_secs = self.tick.as_secs(),
            "Scheduler started"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                wake = wakes.recv() => match wake {
                    Some(entry) => {
                        tracing::trace!(entry = %entry, "Scheduler woken");
                        self.tick().await;
                    }
                    None => break,
                },
            }
        }

        if let Err(e) = cron.shutdown().await {
            tracing::warn!(error = %e, "Failed to shut down cron scheduler");
        }
        tracing::info!("Scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::{NaiveTime, TimeZone};
    use mediaq_broker::JobBroker;
    use mediaq_broker::memory::MemoryBroker;
    use mediaq_core::config::broker::BrokerConfig;
    use mediaq_core::config::processing::ProcessingConfig;
    use mediaq_core::config::scheduler::ScheduleEntryConfig;
    use mediaq_core::types::MediaKind;
    use mediaq_entity::job::JobPayload;

    use super::*;

    #[derive(Debug)]
    struct FixedClock(Mutex<DateTime<Utc>>);

    impl FixedClock {
        fn at(h: u32, m: u32, s: u32) -> Arc<Self> {
            Arc::new(Self(Mutex::new(
                Utc.with_ymd_and_hms(2025, 3, 1, h, m, s).unwrap(),
            )))
        }

        fn set(&self, time: DateTime<Utc>) {
            *self.0.lock().unwrap() = time;
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }
    }

    fn queue() -> (JobQueue, MemoryBroker) {
        let broker = MemoryBroker::new(Duration::from_secs(360));
        let queue = JobQueue::new(
            Arc::new(broker.clone()),
            &BrokerConfig::default(),
            &ProcessingConfig::default(),
        );
        (queue, broker)
    }

    fn scheduler(clock: Arc<FixedClock>) -> (DailyScheduler, MemoryBroker) {
        let (queue, broker) = queue();
        let scheduler =
            DailyScheduler::from_config(&SchedulerConfig::default(), queue, clock).unwrap();
        (scheduler, broker)
    }

    fn entry_config(id: &str, at: NaiveTime) -> ScheduleEntryConfig {
        ScheduleEntryConfig {
            id: id.to_string(),
            fire_time: at.format("%H:%M").to_string(),
            kind: MediaKind::Photo,
            batch_size_limit: 10,
        }
    }

    #[tokio::test]
    async fn test_fires_once_per_day() {
        let clock = FixedClock::at(2, 0, 5);
        let (mut scheduler, broker) = scheduler(clock.clone());

        let fired = scheduler.tick().await;
        assert_eq!(fired.len(), 1);
        let job = broker.get(fired[0]).unwrap();
        assert_eq!(
            job.payload,
            JobPayload::BatchDiscovery {
                media_kind: mediaq_core::types::MediaKind::Photo,
                batch_size_limit: 500,
            }
        );

        clock.set(Utc.with_ymd_and_hms(2025, 3, 1, 2, 0, 35).unwrap());
        assert!(scheduler.tick().await.is_empty());

        clock.set(Utc.with_ymd_and_hms(2025, 3, 2, 2, 0, 10).unwrap());
        assert_eq!(scheduler.tick().await.len(), 1);
        assert_eq!(broker.stats().await.unwrap().ready, 2);
    }

    #[tokio::test]
    async fn test_not_due_outside_fire_minute() {
        let clock = FixedClock::at(2, 1, 0);
        let (mut scheduler, broker) = scheduler(clock.clone());
        assert!(scheduler.tick().await.is_empty());

        clock.set(Utc.with_ymd_and_hms(2025, 3, 1, 2, 30, 0).unwrap());
        assert_eq!(scheduler.tick().await.len(), 1);
        assert_eq!(broker.stats().await.unwrap().ready, 1);
    }

    #[test]
    fn test_cron_wakes_start_on_the_minute() {
        let entry = ScheduleEntry::from_config(&entry_config(
            "photos",
            NaiveTime::from_hms_opt(2, 0, 0).unwrap(),
        ))
        .unwrap();

        let expr = |secs| DailyScheduler::cron_expression(&entry, Duration::from_secs(secs));
        assert_eq!(expr(30), "0,30 0 2 * * *");
        assert_eq!(expr(45), "0,45 0 2 * * *");
        // A full-minute tick still lands inside the fire minute.
        assert_eq!(expr(60), "0 0 2 * * *");
    }

    #[tokio::test]
    async fn test_disabled_scheduler_is_not_started() {
        let (queue, broker) = queue();
        let config = SchedulerConfig {
            enabled: false,
            ..SchedulerConfig::default()
        };

        let handle = DailyScheduler::start(
            &config,
            queue,
            FixedClock::at(2, 0, 0),
            CancellationToken::new(),
        )
        .await
        .unwrap();
        assert!(handle.is_none());
        assert_eq!(broker.stats().await.unwrap().ready, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_run_fires_on_cron_wake_and_stops_on_shutdown() {
        let (queue, broker) = queue();
        // Cover the current and next minute so a minute rollover mid-test
        // still leaves one entry due.
        let now = Utc::now().time();
        let next = now + chrono::Duration::minutes(1);
        let config = SchedulerConfig {
            enabled: true,
            tick_seconds: 1,
            entries: vec![entry_config("this-minute", now), entry_config("next-minute", next)],
        };
        let shutdown = CancellationToken::new();

        let handle = DailyScheduler::start(&config, queue, Arc::new(SystemClock), shutdown.clone())
            .await
            .unwrap()
            .expect("enabled scheduler is spawned");

        let fired = async {
            while broker.stats().await.unwrap().ready == 0 {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        };
        tokio::time::timeout(Duration::from_secs(5), fired)
            .await
            .expect("a cron wake fires the due entry");

        // Further wakes in the same minute do not fire again.
        tokio::time::sleep(Duration::from_millis(1500)).await;
        let ready = broker.stats().await.unwrap().ready;
        assert!((1..=2).contains(&ready), "ready = {ready}");

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("scheduler stops on shutdown")
            .unwrap();
    }
}
