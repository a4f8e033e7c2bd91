//! Redis key builders for broker state.
//!
//! Every queue owns four keys under the configured prefix.

/// List of job ids visible to consumers, FIFO.
pub fn ready(prefix: &str, queue: &str) -> String {
    format!("{prefix}{queue}:ready")
}

/// Sorted set of job ids waiting out a requeue delay, scored by the
/// millisecond timestamp at which they become visible.
pub fn delayed(prefix: &str, queue: &str) -> String {
    format!("{prefix}{queue}:delayed")
}

/// Sorted set of claimed job ids, scored by the millisecond timestamp at
/// which their visibility window closes.
pub fn in_flight(prefix: &str, queue: &str) -> String {
    format!("{prefix}{queue}:inflight")
}

/// Hash of job id to serialized job.
pub fn jobs(prefix: &str, queue: &str) -> String {
    format!("{prefix}{queue}:jobs")
}
