//! Built-in job handler implementations.

pub mod discovery;
pub mod item;

pub use discovery::DiscoveryJobHandler;
pub use item::ItemProcessJobHandler;
