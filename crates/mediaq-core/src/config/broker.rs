//! Broker provider configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level broker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Broker provider type: `"memory"` or `"redis"`.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Queue name jobs are published to.
    #[serde(default = "default_queue")]
    pub queue: String,
    /// Seconds a dequeued job stays invisible before it is redelivered.
    #[serde(default = "default_visibility_timeout")]
    pub visibility_timeout_seconds: u64,
    /// First delay when retrying an unreachable broker, in milliseconds.
    #[serde(default = "default_retry_initial")]
    pub retry_initial_ms: u64,
    /// Upper bound for the broker retry delay, in milliseconds.
    #[serde(default = "default_retry_max")]
    pub retry_max_ms: u64,
    /// Redis-specific configuration.
    #[serde(default)]
    pub redis: RedisBrokerConfig,
}

impl BrokerConfig {
    /// Visibility timeout as a [`Duration`].
    pub fn visibility_timeout(&self) -> Duration {
        Duration::from_secs(self.visibility_timeout_seconds)
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            queue: default_queue(),
            visibility_timeout_seconds: default_visibility_timeout(),
            retry_initial_ms: default_retry_initial(),
            retry_max_ms: default_retry_max(),
            redis: RedisBrokerConfig::default(),
        }
    }
}

/// Redis broker backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisBrokerConfig {
    /// Redis connection URL.
    #[serde(default = "default_redis_url")]
    pub url: String,
    /// Key prefix for all broker keys.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    /// Polling interval while waiting for work, in milliseconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

impl Default for RedisBrokerConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            key_prefix: default_key_prefix(),
            poll_interval_ms: default_poll_interval(),
        }
    }
}

fn default_provider() -> String {
    "memory".to_string()
}

fn default_queue() -> String {
    "media".to_string()
}

fn default_visibility_timeout() -> u64 {
    360
}

fn default_retry_initial() -> u64 {
    500
}

fn default_retry_max() -> u64 {
    30_000
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_key_prefix() -> String {
    "mediaq:".to_string()
}

fn default_poll_interval() -> u64 {
    250
}
