//! Shared test helpers for worker integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use mediaq_broker::memory::MemoryBroker;
use mediaq_broker::{BrokerStats, JobBroker};
use mediaq_core::config::AppConfig;
use mediaq_core::config::worker::JobIsolation;
use mediaq_core::error::AppError;
use mediaq_core::result::AppResult;
use mediaq_core::traits::{Alert, AlertSink, ItemStore, WorkError, WorkFunction};
use mediaq_core::types::{ItemId, JobId, MediaKind, StatusCounts};
use mediaq_database::MemoryItemStore;
use mediaq_entity::job::Job;
use mediaq_entity::worker::SlotSnapshot;
use mediaq_worker::jobs::{DiscoveryJobHandler, ItemProcessJobHandler};
use mediaq_worker::{JobExecutor, JobQueue, Supervisor};

/// Configuration with short, test-friendly limits. Bodies run as tasks so
/// paused-clock tests drive every timer from one runtime.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.worker.job_isolation = JobIsolation::Task;
    config.worker.concurrency = 1;
    config.worker.max_tasks_per_child = 1000;
    config.worker.soft_time_limit_seconds = 2;
    config.worker.hard_time_limit_seconds = 4;
    config.worker.dequeue_timeout_seconds = 5;
    config.worker.shutdown_grace_seconds = 5;
    config.broker.visibility_timeout_seconds = 10;
    config.supervisor.restart_delay_seconds = 1;
    config.processing.retry_delay_seconds = 1;
    config.processing.max_retry_delay_seconds = 4;
    config
}

/// A running worker pool over in-memory collaborators.
pub struct TestHarness {
    pub store: MemoryItemStore,
    pub broker: MemoryBroker,
    pub queue: JobQueue,
    pub alerts: Arc<RecordingAlertSink>,
    pub supervisor: Arc<Supervisor>,
    pub shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

impl TestHarness {
    /// Start a pool using the in-memory broker.
    pub fn start(config: AppConfig, work: Arc<dyn WorkFunction>) -> Self {
        let broker = MemoryBroker::new(config.broker.visibility_timeout());
        Self::start_with_broker(config, work, broker.clone(), Arc::new(broker))
    }

    /// Start a pool whose workers talk to `transport`, which must front
    /// `broker`.
    pub fn start_with_broker(
        config: AppConfig,
        work: Arc<dyn WorkFunction>,
        broker: MemoryBroker,
        transport: Arc<dyn JobBroker>,
    ) -> Self {
        config.validate().expect("test config must be valid");

        let store = MemoryItemStore::new();
        let queue = JobQueue::new(transport, &config.broker, &config.processing);

        let mut executor = JobExecutor::new();
        executor.register(Arc::new(DiscoveryJobHandler::new(
            Arc::new(store.clone()),
            queue.clone(),
        )));
        executor.register(Arc::new(ItemProcessJobHandler::new(
            Arc::new(store.clone()),
            work,
        )));

        let alerts = Arc::new(RecordingAlertSink::default());
        let supervisor = Arc::new(Supervisor::new(
            queue.clone(),
            Arc::new(executor),
            alerts.clone(),
            &config,
        ));

        let shutdown = CancellationToken::new();
        let handle = {
            let supervisor = Arc::clone(&supervisor);
            let shutdown = shutdown.clone();
            tokio::spawn(async move { supervisor.run(shutdown).await })
        };

        Self {
            store,
            broker,
            queue,
            alerts,
            supervisor,
            shutdown,
            handle,
        }
    }

    /// Insert `n` pending items of `kind`.
    pub fn seed(&self, kind: MediaKind, n: usize) -> Vec<ItemId> {
        (0..n)
            .map(|_| self.store.insert_pending(kind, Utc::now()))
            .collect()
    }

    /// Enqueue a discovery job for `kind`.
    pub async fn discover(&self, kind: MediaKind, limit: usize) -> JobId {
        self.queue
            .enqueue_discovery(kind, limit, &CancellationToken::new())
            .await
            .expect("enqueue discovery")
    }

    /// Enqueue an item job.
    pub async fn process(&self, item_id: ItemId, kind: MediaKind) -> JobId {
        self.queue
            .enqueue_item(item_id, kind, &CancellationToken::new())
            .await
            .expect("enqueue item")
    }

    pub async fn counts(&self, kind: MediaKind) -> StatusCounts {
        self.store.status_counts(kind).await.expect("status counts")
    }

    pub async fn broker_stats(&self) -> BrokerStats {
        self.broker.stats().await.expect("broker stats")
    }

    pub fn snapshot(&self) -> Vec<SlotSnapshot> {
        self.supervisor.snapshot()
    }

    /// Poll item counts of `kind` until `done` holds or `limit` passes.
    pub async fn wait_for_counts(
        &self,
        kind: MediaKind,
        limit: Duration,
        done: impl Fn(&StatusCounts) -> bool,
    ) -> bool {
        let give_up = Instant::now() + limit;
        loop {
            if done(&self.counts(kind).await) {
                return true;
            }
            if Instant::now() >= give_up {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
    }

    /// Poll `done` until it holds or `limit` passes.
    pub async fn wait_until(&self, limit: Duration, done: impl Fn(&Self) -> bool) -> bool {
        let give_up = Instant::now() + limit;
        loop {
            if done(self) {
                return true;
            }
            if Instant::now() >= give_up {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
    }

    /// Request shutdown and wait for the supervisor to return.
    pub async fn stop(self) {
        self.shutdown.cancel();
        self.handle.await.expect("supervisor task");
    }
}

/// Alert sink that keeps every alert.
#[derive(Debug, Default)]
pub struct RecordingAlertSink {
    alerts: Mutex<Vec<Alert>>,
}

impl RecordingAlertSink {
    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.lock().unwrap().clone()
    }
}

#[async_trait]
impl AlertSink for RecordingAlertSink {
    async fn raise(&self, alert: Alert) -> AppResult<()> {
        self.alerts.lock().unwrap().push(alert);
        Ok(())
    }
}

/// Work function that sleeps per call, honours cancellation, and tracks
/// how many calls overlap.
#[derive(Debug, Default)]
pub struct TimedWork {
    pub duration: Duration,
    pub calls: AtomicUsize,
    pub cancelled: AtomicUsize,
    active: AtomicUsize,
    pub peak: AtomicUsize,
}

impl TimedWork {
    pub fn new(duration: Duration) -> Arc<Self> {
        Arc::new(Self {
            duration,
            ..Self::default()
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WorkFunction for TimedWork {
    async fn process(
        &self,
        _item_id: ItemId,
        _kind: MediaKind,
        cancel: CancellationToken,
    ) -> Result<(), WorkError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now_active, Ordering::SeqCst);

        let result = tokio::select! {
            _ = cancel.cancelled() => {
                self.cancelled.fetch_add(1, Ordering::SeqCst);
                Err(WorkError::Transient("cancelled".to_string()))
            }
            _ = tokio::time::sleep(self.duration) => Ok(()),
        };

        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Work function that always returns the same error.
#[derive(Debug)]
pub struct FailingWork {
    pub error: WorkError,
    pub calls: AtomicUsize,
}

impl FailingWork {
    pub fn new(error: WorkError) -> Arc<Self> {
        Arc::new(Self {
            error,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WorkFunction for FailingWork {
    async fn process(
        &self,
        _item_id: ItemId,
        _kind: MediaKind,
        _cancel: CancellationToken,
    ) -> Result<(), WorkError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(self.error.clone())
    }
}

/// Work function whose first call ignores cancellation and hangs; later
/// calls succeed immediately.
#[derive(Debug, Default)]
pub struct HangOnceWork {
    pub calls: AtomicUsize,
}

impl HangOnceWork {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WorkFunction for HangOnceWork {
    async fn process(
        &self,
        _item_id: ItemId,
        _kind: MediaKind,
        _cancel: CancellationToken,
    ) -> Result<(), WorkError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_secs(1000)).await;
        }
        Ok(())
    }
}

/// Work function whose first call blocks its thread without yielding;
/// later calls succeed immediately.
#[derive(Debug)]
pub struct BlockingOnceWork {
    pub block_for: Duration,
    pub calls: AtomicUsize,
}

impl BlockingOnceWork {
    pub fn new(block_for: Duration) -> Arc<Self> {
        Arc::new(Self {
            block_for,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WorkFunction for BlockingOnceWork {
    async fn process(
        &self,
        _item_id: ItemId,
        _kind: MediaKind,
        _cancel: CancellationToken,
    ) -> Result<(), WorkError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            std::thread::sleep(self.block_for);
        }
        Ok(())
    }
}

/// Work function that panics every time.
#[derive(Debug, Default)]
pub struct PanickingWork;

#[async_trait]
impl WorkFunction for PanickingWork {
    async fn process(
        &self,
        item_id: ItemId,
        _kind: MediaKind,
        _cancel: CancellationToken,
    ) -> Result<(), WorkError> {
        panic!("analysis crashed on {item_id}");
    }
}

/// Broker front that reports the first `failures` dequeue calls as
/// unreachable.
#[derive(Debug)]
pub struct FlakyBroker {
    inner: MemoryBroker,
    remaining: AtomicUsize,
    pub failed_calls: AtomicUsize,
}

impl FlakyBroker {
    pub fn new(inner: MemoryBroker, failures: usize) -> Arc<Self> {
        Arc::new(Self {
            inner,
            remaining: AtomicUsize::new(failures),
            failed_calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl JobBroker for FlakyBroker {
    async fn enqueue(&self, job: Job) -> AppResult<JobId> {
        self.inner.enqueue(job).await
    }

    async fn dequeue(&self, timeout: Duration) -> AppResult<Option<Job>> {
        let failing = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            self.failed_calls.fetch_add(1, Ordering::SeqCst);
            return Err(AppError::broker_unavailable("connection refused"));
        }
        self.inner.dequeue(timeout).await
    }

    async fn ack(&self, job_id: JobId) -> AppResult<()> {
        self.inner.ack(job_id).await
    }

    async fn nack(&self, job_id: JobId, requeue_delay: Duration) -> AppResult<()> {
        self.inner.nack(job_id, requeue_delay).await
    }

    async fn stats(&self) -> AppResult<BrokerStats> {
        self.inner.stats().await
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(self.remaining.load(Ordering::SeqCst) == 0)
    }
}

/// Broker front whose enqueue takes `delay`, so a fan-out is slow enough
/// to be cut by the soft limit.
#[derive(Debug)]
pub struct SlowEnqueueBroker {
    inner: MemoryBroker,
    delay: Duration,
}

impl SlowEnqueueBroker {
    pub fn new(inner: MemoryBroker, delay: Duration) -> Arc<Self> {
        Arc::new(Self { inner, delay })
    }
}

#[async_trait]
impl JobBroker for SlowEnqueueBroker {
    async fn enqueue(&self, job: Job) -> AppResult<JobId> {
        tokio::time::sleep(self.delay).await;
        self.inner.enqueue(job).await
    }

    async fn dequeue(&self, timeout: Duration) -> AppResult<Option<Job>> {
        self.inner.dequeue(timeout).await
    }

    async fn ack(&self, job_id: JobId) -> AppResult<()> {
        self.inner.ack(job_id).await
    }

    async fn nack(&self, job_id: JobId, requeue_delay: Duration) -> AppResult<()> {
        self.inner.nack(job_id, requeue_delay).await
    }

    async fn stats(&self) -> AppResult<BrokerStats> {
        self.inner.stats().await
    }

    async fn health_check(&self) -> AppResult<bool> {
        self.inner.health_check().await
    }
}
