//! Metric helpers for `framecast`.
//!
//! This module defines metric names and thin helpers wrapping the
//! [`metrics`](https://docs.rs/metrics) crate. With the `metrics` feature
//! disabled the helpers compile to no-ops.

#[cfg(feature = "metrics")]
use metrics::{counter, gauge};

/// Name of the gauge tracking registered connections.
pub const CONNECTIONS_ACTIVE: &str = "framecast_connections_active";
/// Name of the counter tracking frames handed to the broadcaster.
pub const FRAMES_BROADCAST: &str = "framecast_frames_broadcast_total";
/// Name of the counter tracking connections removed after a failure.
pub const CONNECTIONS_PRUNED: &str = "framecast_connections_pruned_total";
/// Name of the counter tracking error occurrences.
pub const ERRORS_TOTAL: &str = "framecast_errors_total";

/// Increment the active connections gauge.
pub fn inc_connections() {
    #[cfg(feature = "metrics")]
    gauge!(CONNECTIONS_ACTIVE).increment(1.0);
}

/// Decrement the active connections gauge by `count`.
pub fn dec_connections(count: usize) {
    #[cfg(feature = "metrics")]
    gauge!(CONNECTIONS_ACTIVE).decrement(count as f64);
    #[cfg(not(feature = "metrics"))]
    let _ = count;
}

/// Record one broadcast frame.
pub fn inc_frames_broadcast() {
    #[cfg(feature = "metrics")]
    counter!(FRAMES_BROADCAST).increment(1);
}

/// Record connections removed after send failures or peer closure.
pub fn inc_pruned(count: usize) {
    #[cfg(feature = "metrics")]
    counter!(CONNECTIONS_PRUNED).increment(count as u64);
    #[cfg(not(feature = "metrics"))]
    let _ = count;
}

/// Record an error occurrence tagged with its source.
pub fn inc_errors(kind: &'static str) {
    #[cfg(feature = "metrics")]
    counter!(ERRORS_TOTAL, "kind" => kind).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = kind;
}
