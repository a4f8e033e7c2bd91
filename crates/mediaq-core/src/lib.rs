//! # mediaq-core
//!
//! Core crate for MediaQ. Contains configuration schemas, typed
//! identifiers, the collaborator traits the worker core calls into
//! (item store, work function, alerting), and the unified error system.
//!
//! This crate has **no** internal dependencies on other MediaQ crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
