//! # mediaq-broker
//!
//! Job broker implementations for MediaQ. Supports two modes:
//!
//! - **memory**: in-process queue with visibility timeouts, for tests and
//!   single-node development
//! - **redis**: durable queue on Redis lists and sorted sets using the
//!   [redis](https://crates.io/crates/redis) crate
//!
//! The provider is selected at runtime based on configuration.

pub mod broker;
pub mod keys;
#[cfg(feature = "memory")]
pub mod memory;
pub mod provider;
#[cfg(feature = "redis-backend")]
pub mod redis;

pub use broker::{BrokerStats, JobBroker};
pub use provider::BrokerManager;
