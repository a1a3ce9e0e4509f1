//! Prometheus metrics for the dispatch engine.
//!
//! Tracks invitation issuance, terminal dispatch outcomes, join
//! resolutions, and transport send latency.

mod helpers;

pub use helpers::{encode_metrics, DispatchMetrics, JoinMetrics};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, Histogram, IntCounter,
    IntCounterVec,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "gather";

lazy_static! {
    /// Invitations issued, by delivery method
    pub static ref INVITATIONS_ISSUED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_invitations_issued_total", METRIC_PREFIX),
        "Total invitations issued",
        &["delivery"]
    ).unwrap();

    /// Terminal dispatch outcomes, by audit outcome kind
    pub static ref DISPATCH_OUTCOMES_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_dispatch_outcomes_total", METRIC_PREFIX),
        "Terminal dispatch outcomes",
        &["outcome"]
    ).unwrap();

    /// Join resolutions, by result
    pub static ref JOIN_RESOLUTIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_join_resolutions_total", METRIC_PREFIX),
        "Join token resolutions",
        &["result"]
    ).unwrap();

    /// Compensating invitation deletions after an authoritative quota denial
    pub static ref INVITATIONS_REVOKED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_invitations_revoked_total", METRIC_PREFIX),
        "Invitations deleted by the quota compensation path"
    ).unwrap();

    /// Transport send latency in seconds
    pub static ref SEND_DURATION_SECONDS: Histogram = register_histogram!(
        format!("{}_send_duration_seconds", METRIC_PREFIX),
        "Transport send latency",
        vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    ).unwrap();
}
