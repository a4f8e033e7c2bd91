//! Broker manager that dispatches to the configured provider.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use mediaq_core::config::broker::BrokerConfig;
use mediaq_core::error::AppError;
use mediaq_core::result::AppResult;
use mediaq_core::types::JobId;
use mediaq_entity::job::Job;

use crate::broker::{BrokerStats, JobBroker};

/// Broker manager that wraps the configured broker provider.
///
/// The provider is selected at construction time based on configuration.
#[derive(Debug, Clone)]
pub struct BrokerManager {
    /// The inner broker.
    inner: Arc<dyn JobBroker>,
}

impl BrokerManager {
    /// Create a new broker manager from configuration.
    pub async fn new(config: &BrokerConfig) -> AppResult<Self> {
        let inner: Arc<dyn JobBroker> = match config.provider.as_str() {
            #[cfg(feature = "redis-backend")]
            "redis" => {
                info!(queue = %config.queue, "Initializing Redis broker");
                let client = crate::redis::RedisClient::connect(&config.redis).await?;
                Arc::new(crate::redis::RedisBroker::new(client, config))
            }
            #[cfg(feature = "memory")]
            "memory" => {
                info!(queue = %config.queue, "Initializing in-memory broker");
                Arc::new(crate::memory::MemoryBroker::new(config.visibility_timeout()))
            }
            other => {
                return Err(AppError::configuration(format!(
                    "Unknown broker provider: '{other}'. Supported: memory, redis"
                )));
            }
        };

        Ok(Self { inner })
    }

    /// Create a broker manager from an existing broker (for testing).
    pub fn from_broker(broker: Arc<dyn JobBroker>) -> Self {
        Self { inner: broker }
    }

    /// Get a reference to the inner broker.
    pub fn broker(&self) -> &dyn JobBroker {
        self.inner.as_ref()
    }
}

#[async_trait]
impl JobBroker for BrokerManager {
    async fn enqueue(&self, job: Job) -> AppResult<JobId> {
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

#[cfg(test)]
mod tests {
    use super::*;
    use mediaq_core::error::ErrorKind;

    #[tokio::test]
    async fn test_memory_provider_selected() {
        let manager = BrokerManager::new(&BrokerConfig::default()).await.unwrap();
        assert!(manager.health_check().await.unwrap());
        assert_eq!(manager.stats().await.unwrap(), BrokerStats::default());
    }

    #[tokio::test]
    async fn test_unknown_provider_rejected() {
        let config = BrokerConfig {
            provider: "kafka".to_string(),
            ..BrokerConfig::default()
        };
        let err = BrokerManager::new(&config).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Configuration);
    }
}
