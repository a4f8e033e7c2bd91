//! Redis broker provider.

pub mod client;
pub mod scripts;
pub mod broker;

pub use broker::RedisBroker;
pub use client::RedisClient;
