//! Redis-backed job broker.
//!
//! Layout per queue: a ready list, a delayed sorted set, an in-flight
//! sorted set scored by visibility deadline, and a hash of job bodies.
//! Expired claims are redelivered by whichever consumer polls next.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::time::Instant;
use tracing::{debug, warn};

use mediaq_core::config::broker::BrokerConfig;
use mediaq_core::error::{AppError, ErrorKind};
use mediaq_core::result::AppResult;
use mediaq_core::types::JobId;
use mediaq_entity::job::Job;

use super::client::RedisClient;
use super::scripts::BrokerScripts;
use crate::broker::{BrokerStats, JobBroker};
use crate::keys;

/// Redis-backed broker.
#[derive(Debug, Clone)]
pub struct RedisBroker {
    client: RedisClient,
    scripts: BrokerScripts,
    ready_key: String,
    delayed_key: String,
    in_flight_key: String,
    jobs_key: String,
    visibility_timeout: Duration,
    poll_interval: Duration,
}

impl RedisBroker {
    /// Create a broker over an established client.
    pub fn new(client: RedisClient, config: &BrokerConfig) -> Self {
        let prefix = client.prefix().to_string();
        Self {
            ready_key: keys::ready(&prefix, &config.queue),
            delayed_key: keys::delayed(&prefix, &config.queue),
            in_flight_key: keys::in_flight(&prefix, &config.queue),
            jobs_key: keys::jobs(&prefix, &config.queue),
            client,
            scripts: BrokerScripts::new(),
            visibility_timeout: config.visibility_timeout(),
            poll_interval: Duration::from_millis(config.redis.poll_interval_ms.max(1)),
        }
    }

    /// Map a Redis error to an AppError, separating connectivity failures.
    fn map_err(e: redis::RedisError) -> AppError {
        let kind = if e.is_io_error()
            || e.is_connection_refusal()
            || e.is_connection_dropped()
            || e.is_timeout()
        {
            ErrorKind::BrokerUnavailable
        } else {
            ErrorKind::Broker
        };
        AppError::with_source(kind, format!("Redis error: {e}"), e)
    }

    fn millis_from_now(offset: Duration) -> i64 {
        Utc::now().timestamp_millis() + offset.as_millis() as i64
    }

    async fn promote(&self) -> AppResult<()> {
        let mut conn = self.client.conn_mut();
        let redelivered: i64 = self
            .scripts
            .promote
            .key(&self.ready_key)
            .key(&self.delayed_key)
            .key(&self.in_flight_key)
            .key(&self.jobs_key)
            .arg(Utc::now().timestamp_millis())
            .invoke_async(&mut conn)
            .await
            .map_err(Self::map_err)?;

        if redelivered > 0 {
            warn!(count = redelivered, "Visibility timeout expired, redelivered jobs");
        }
        Ok(())
    }

    async fn claim(&self) -> AppResult<Option<Job>> {
        let mut conn = self.client.conn_mut();
        let raw: Option<String> = self
            .scripts
            .claim
            .key(&self.ready_key)
            .key(&self.in_flight_key)
            .key(&self.jobs_key)
            .arg(Self::millis_from_now(self.visibility_timeout))
            .invoke_async(&mut conn)
            .await
            .map_err(Self::map_err)?;

        let Some(raw) = raw else {
            return Ok(None);
        };
        let mut job: Job = serde_json::from_str(&raw)?;
        job.claim(Utc::now())?;
        Ok(Some(job))
    }
}

#[async_trait]
impl JobBroker for RedisBroker {
    async fn enqueue(&self, job: Job) -> AppResult<JobId> {
        let body = serde_json::to_string(&job)?;
        let mut conn = self.client.conn_mut();
        let inserted: i64 = self
            .scripts
            .enqueue
            .key(&self.jobs_key)
            .key(&self.ready_key)
            .arg(job.id.to_string())
            .arg(body)
            .invoke_async(&mut conn)
            .await
            .map_err(Self::map_err)?;

        if inserted == 0 {
            return Err(AppError::conflict(format!("Job {} is already queued", job.id)));
        }
        debug!(job_id = %job.id, kind = %job.kind(), "Enqueued job");
        Ok(job.id)
    }

    async fn dequeue(&self, timeout: Duration) -> AppResult<Option<Job>> {
        let give_up = Instant::now() + timeout;

        loop {
            self.promote().await?;
            if let Some(job) = self.claim().await? {
                return Ok(Some(job));
            }

            let now = Instant::now();
            if now >= give_up {
                return Ok(None);
            }
            tokio::time::sleep(self.poll_interval.min(give_up - now)).await;
        }
    }

    async fn ack(&self, job_id: JobId) -> AppResult<()> {
        let mut conn = self.client.conn_mut();
        let removed: i64 = self
            .scripts
            .ack
            .key(&self.in_flight_key)
            .key(&self.jobs_key)
            .arg(job_id.to_string())
            .invoke_async(&mut conn)
            .await
            .map_err(Self::map_err)?;

        if removed == 0 {
            return Err(AppError::broker(format!("Job {job_id} is not in flight")));
        }
        debug!(job_id = %job_id, "Acked job");
        Ok(())
    }

    async fn nack(&self, job_id: JobId, requeue_delay: Duration) -> AppResult<()> {
        let mut conn = self.client.conn_mut();
        let requeued: i64 = self
            .scripts
            .nack
            .key(&self.in_flight_key)
            .key(&self.delayed_key)
            .key(&self.ready_key)
            .key(&self.jobs_key)
            .arg(job_id.to_string())
            .arg(Self::millis_from_now(requeue_delay))
            .arg(requeue_delay.as_millis() as u64)
            .invoke_async(&mut conn)
            .await
            .map_err(Self::map_err)?;

        if requeued == 0 {
            return Err(AppError::broker(format!("Job {job_id} is not in flight")));
        }
        debug!(
            job_id = %job_id,
            delay_ms = requeue_delay.as_millis() as u64,
            "Nacked job"
        );
        Ok(())
    }

    async fn stats(&self) -> AppResult<BrokerStats> {
        let mut conn = self.client.conn_mut();
        let (ready, delayed, in_flight): (u64, u64, u64) = redis::pipe()
            .cmd("LLEN")
            .arg(&self.ready_key)
            .cmd("ZCARD")
            .arg(&self.delayed_key)
            .cmd("ZCARD")
            .arg(&self.in_flight_key)
            .query_async(&mut conn)
            .await
            .map_err(Self::map_err)?;

        Ok(BrokerStats {
            ready,
            delayed,
            in_flight,
        })
    }

    async fn health_check(&self) -> AppResult<bool> {
        let mut conn = self.client.conn_mut();
        let pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(Self::map_err)?;
        Ok(pong == "PONG")
    }
}
