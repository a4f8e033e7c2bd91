//! Collaborator traits the worker core depends on.
//!
//! Implementations live in other crates (`mediaq-database` for item
//! stores, `mediaq-worker` for the shipped work function and alert sink),
//! which keeps this crate free of I/O.

pub mod alert;
pub mod item_store;
pub mod work;

pub use alert::{Alert, AlertSeverity, AlertSink};
pub use item_store::ItemStore;
pub use work::{WorkError, WorkFunction};
