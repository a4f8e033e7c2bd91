//! Redis connection management.

use redis::Client;
use redis::aio::ConnectionManager;
use tracing::info;

use mediaq_core::config::broker::RedisBrokerConfig;
use mediaq_core::config::mask_credentials;
use mediaq_core::error::{AppError, ErrorKind};
use mediaq_core::result::AppResult;

/// Redis client wrapper with connection management.
#[derive(Debug, Clone)]
pub struct RedisClient {
    /// Redis connection manager (multiplexed, reconnecting).
    conn: ConnectionManager,
    /// Key prefix for all broker keys.
    key_prefix: String,
}

impl RedisClient {
    /// Create a new Redis client from configuration.
    pub async fn connect(config: &RedisBrokerConfig) -> AppResult<Self> {
        info!(url = %mask_credentials(&config.url), "Connecting to Redis");

        let client = Client::open(config.url.as_str()).map_err(|e| {
            AppError::with_source(ErrorKind::Configuration, "Invalid Redis URL", e)
        })?;

        let conn = ConnectionManager::new(client).await.map_err(|e| {
            AppError::with_source(ErrorKind::BrokerUnavailable, "Failed to connect to Redis", e)
        })?;

        info!("Successfully connected to Redis");
        Ok(Self {
            conn,
            key_prefix: config.key_prefix.clone(),
        })
    }

    /// Get a mutable clone of the connection manager.
    pub fn conn_mut(&self) -> ConnectionManager {
        self.conn.clone()
    }

    /// Return the key prefix.
    pub fn prefix(&self) -> &str {
        &self.key_prefix
    }
}
