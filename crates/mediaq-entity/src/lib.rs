//! # mediaq-entity
//!
//! Domain models for MediaQ: queued jobs and their payloads, the
//! processing-state view of media items, daily schedule entries, and the
//! worker/supervisor bookkeeping records. Database rows additionally
//! derive `sqlx::FromRow`.

pub mod item;
pub mod job;
pub mod schedule;
pub mod worker;
