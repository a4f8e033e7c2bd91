//! In-process broker with visibility timeouts.
//!
//! Timing uses `tokio::time::Instant`, so tests running with a paused
//! clock see deterministic redelivery.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, warn};

use mediaq_core::error::AppError;
use mediaq_core::result::AppResult;
use mediaq_core::types::JobId;
use mediaq_entity::job::Job;

use crate::broker::{BrokerStats, JobBroker};

#[derive(Debug, Default)]
struct QueueState {
    jobs: HashMap<JobId, Job>,
    ready: VecDeque<JobId>,
    delayed: BTreeSet<(Instant, JobId)>,
    in_flight: HashMap<JobId, Instant>,
}

impl QueueState {
    /// Move due delayed jobs to ready and redeliver expired claims.
    fn promote(&mut self, now: Instant) {
        while let Some(&(visible_at, id)) = self.delayed.first() {
            if visible_at > now {
                break;
            }
            self.delayed.pop_first();
            self.ready.push_back(id);
        }

        let expired: Vec<JobId> = self
            .in_flight
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(id, _)| *id)
            .collect();

        for id in expired {
            self.in_flight.remove(&id);
            if let Some(job) = self.jobs.remove(&id) {
                let job = job.requeued();
                warn!(
                    job_id = %id,
                    attempts = job.attempts,
                    "Visibility timeout expired, redelivering job"
                );
                self.jobs.insert(id, job);
                self.ready.push_back(id);
            }
        }
    }

    /// Earliest instant at which `promote` would change something.
    fn next_wake(&self) -> Option<Instant> {
        let delayed = self.delayed.first().map(|(at, _)| *at);
        let in_flight = self.in_flight.values().min().copied();
        match (delayed, in_flight) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }
}

/// Broker that keeps all jobs in process memory.
///
/// Cloning shares the underlying queue.
#[derive(Debug, Clone)]
pub struct MemoryBroker {
    state: Arc<Mutex<QueueState>>,
    notify: Arc<Notify>,
    visibility_timeout: Duration,
}

impl MemoryBroker {
    /// Create an empty broker.
    pub fn new(visibility_timeout: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(QueueState::default())),
            notify: Arc::new(Notify::new()),
            visibility_timeout,
        }
    }

    /// Look up a job held by the broker, in any state.
    pub fn get(&self, job_id: JobId) -> Option<Job> {
        self.lock().ok().and_then(|s| s.jobs.get(&job_id).cloned())
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, QueueState>> {
        self.state
            .lock()
            .map_err(|_| AppError::internal("Memory broker state lock poisoned"))
    }

    fn try_claim(&self, now: Instant) -> AppResult<(Option<Job>, Option<Instant>)> {
        let mut state = self.lock()?;
        state.promote(now);

        while let Some(id) = state.ready.pop_front() {
            let Some(job) = state.jobs.get_mut(&id) else {
                continue;
            };
            job.claim(Utc::now())?;
            let job = job.clone();
            state.in_flight.insert(id, now + self.visibility_timeout);
            return Ok((Some(job), None));
        }

        Ok((None, state.next_wake()))
    }
}

#[async_trait]
impl JobBroker for MemoryBroker {
    async fn enqueue(&self, job: Job) -> AppResult<JobId> {
        let id = job.id;
        {
            let mut state = self.lock()?;
            if state.jobs.contains_key(&id) {
                return Err(AppError::conflict(format!("Job {id} is already queued")));
            }
            debug!(job_id = %id, kind = %job.kind(), "Enqueued job");
            state.jobs.insert(id, job);
            state.ready.push_back(id);
        }
        self.notify.notify_one();
        Ok(id)
    }

    async fn dequeue(&self, timeout: Duration) -> AppResult<Option<Job>> {
        let give_up = Instant::now() + timeout;

        loop {
            let now = Instant::now();
            let (job, next_wake) = self.try_claim(now)?;
            if job.is_some() {
                return Ok(job);
            }
            if now >= give_up {
                return Ok(None);
            }

            let wake = next_wake.map_or(give_up, |at| at.min(give_up));
            tokio::select! {
                _ = self.notify.notified() => {}
                _ = tokio::time::sleep_until(wake) => {}
            }
        }
    }

    async fn ack(&self, job_id: JobId) -> AppResult<()> {
        let mut state = self.lock()?;
        if state.in_flight.remove(&job_id).is_none() {
            return Err(AppError::broker(format!("Job {job_id} is not in flight")));
        }
        state.jobs.remove(&job_id);
        debug!(job_id = %job_id, "Acked job");
        Ok(())
    }

    async fn nack(&self, job_id: JobId, requeue_delay: Duration) -> AppResult<()> {
        {
            let mut state = self.lock()?;
            if state.in_flight.remove(&job_id).is_none() {
                return Err(AppError::broker(format!("Job {job_id} is not in flight")));
            }
            let Some(job) = state.jobs.remove(&job_id) else {
                return Err(AppError::internal(format!("Job {job_id} has no stored body")));
            };
            let job = job.requeued();
            debug!(
                job_id = %job_id,
                attempts = job.attempts,
                delay_ms = requeue_delay.as_millis() as u64,
                "Nacked job"
            );
            state.jobs.insert(job_id, job);
            if requeue_delay.is_zero() {
                state.ready.push_back(job_id);
            } else {
                state
                    .delayed
                    .insert((Instant::now() + requeue_delay, job_id));
            }
        }
        self.notify.notify_one();
        Ok(())
    }

    async fn stats(&self) -> AppResult<BrokerStats> {
        let mut state = self.lock()?;
        state.promote(Instant::now());
        Ok(BrokerStats {
            ready: state.ready.len() as u64,
            delayed: state.delayed.len() as u64,
            in_flight: state.in_flight.len() as u64,
        })
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(self.lock().is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediaq_core::types::{ItemId, MediaKind};
    use mediaq_entity::job::{JobPayload, JobStatus};

    fn item_job() -> Job {
        Job::new(
            JobPayload::ItemProcess {
                item_id: ItemId::new(),
                item_kind: MediaKind::Video,
            },
            3,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_fifo_delivery_and_ack() {
        let broker = MemoryBroker::new(Duration::from_secs(60));
        let first = broker.enqueue(item_job()).await.unwrap();
        let second = broker.enqueue(item_job()).await.unwrap();

        let job = broker.dequeue(Duration::ZERO).await.unwrap().unwrap();
        assert_eq!(job.id, first);
        assert_eq!(job.status, JobStatus::Claimed);
        broker.ack(first).await.unwrap();

        let job = broker.dequeue(Duration::ZERO).await.unwrap().unwrap();
        assert_eq!(job.id, second);

        let stats = broker.stats().await.unwrap();
        assert_eq!(stats, BrokerStats { ready: 0, delayed: 0, in_flight: 1 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_dequeue_times_out_when_empty() {
        let broker = MemoryBroker::new(Duration::from_secs(60));
        let started = Instant::now();
        let job = broker.dequeue(Duration::from_secs(5)).await.unwrap();
        assert!(job.is_none());
        assert!(started.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dequeue_wakes_on_enqueue() {
        let broker = MemoryBroker::new(Duration::from_secs(60));
        let consumer = {
            let broker = broker.clone();
            tokio::spawn(async move { broker.dequeue(Duration::from_secs(30)).await })
        };
        tokio::time::sleep(Duration::from_secs(1)).await;
        let id = broker.enqueue(item_job()).await.unwrap();
        let job = consumer.await.unwrap().unwrap().unwrap();
        assert_eq!(job.id, id);
    }

    #[tokio::test(start_paused = true)]
    async fn test_visibility_timeout_redelivers_with_attempt() {
        let broker = MemoryBroker::new(Duration::from_secs(10));
        let id = broker.enqueue(item_job()).await.unwrap();
        let job = broker.dequeue(Duration::ZERO).await.unwrap().unwrap();
        assert_eq!(job.attempts, 0);

        assert!(broker.dequeue(Duration::from_secs(5)).await.unwrap().is_none());

        let job = broker.dequeue(Duration::from_secs(10)).await.unwrap().unwrap();
        assert_eq!(job.id, id);
        assert_eq!(job.attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_nack_delays_and_counts_attempt() {
        let broker = MemoryBroker::new(Duration::from_secs(60));
        let id = broker.enqueue(item_job()).await.unwrap();
        broker.dequeue(Duration::ZERO).await.unwrap().unwrap();
        broker.nack(id, Duration::from_secs(30)).await.unwrap();

        assert_eq!(broker.stats().await.unwrap().delayed, 1);
        assert!(broker.dequeue(Duration::from_secs(10)).await.unwrap().is_none());

        let job = broker.dequeue(Duration::from_secs(30)).await.unwrap().unwrap();
        assert_eq!(job.id, id);
        assert_eq!(job.attempts, 1);
        assert_eq!(job.status, JobStatus::Claimed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ack_of_unknown_job_fails() {
        let broker = MemoryBroker::new(Duration::from_secs(60));
        let err = broker.ack(JobId::new()).await.unwrap_err();
        assert_eq!(err.kind, mediaq_core::error::ErrorKind::Broker);
    }

    #[tokio::test]
    async fn test_duplicate_enqueue_rejected() {
        let broker = MemoryBroker::new(Duration::from_secs(60));
        let job = item_job();
        broker.enqueue(job.clone()).await.unwrap();
        assert!(broker.enqueue(job).await.is_err());
    }
}
