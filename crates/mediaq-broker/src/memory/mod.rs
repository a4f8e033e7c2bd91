//! In-memory broker provider.

pub mod broker;

pub use broker::MemoryBroker;
