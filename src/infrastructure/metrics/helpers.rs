//! Metrics helper structs for convenient metric recording

use prometheus::{Encoder, TextEncoder};

use crate::audit::DispatchOutcome;
use crate::invitation::DeliveryMethod;

use super::{
    DISPATCH_OUTCOMES_TOTAL, INVITATIONS_ISSUED_TOTAL, INVITATIONS_REVOKED_TOTAL,
    JOIN_RESOLUTIONS_TOTAL, SEND_DURATION_SECONDS,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Helper struct for recording dispatch metrics
pub struct DispatchMetrics;

impl DispatchMetrics {
    /// Record an issued invitation
    pub fn record_issued(delivery: DeliveryMethod) {
        INVITATIONS_ISSUED_TOTAL
            .with_label_values(&[delivery.as_str()])
            .inc();
    }

    /// Record a terminal dispatch outcome
    pub fn record_outcome(outcome: DispatchOutcome) {
        DISPATCH_OUTCOMES_TOTAL
            .with_label_values(&[outcome.as_str()])
            .inc();
    }

    /// Record a compensating invitation deletion
    pub fn record_revoked() {
        INVITATIONS_REVOKED_TOTAL.inc();
    }

    /// Record how long a transport send took
    pub fn record_send_duration(seconds: f64) {
        SEND_DURATION_SECONDS.observe(seconds);
    }
}

/// Helper struct for recording join resolution metrics
pub struct JoinMetrics;

impl JoinMetrics {
    pub fn record_resolved() {
        JOIN_RESOLUTIONS_TOTAL.with_label_values(&["resolved"]).inc();
    }

    pub fn record_not_found() {
        JOIN_RESOLUTIONS_TOTAL.with_label_values(&["not_found"]).inc();
    }

    pub fn record_inactive() {
        JOIN_RESOLUTIONS_TOTAL.with_label_values(&["inactive"]).inc();
    }

    pub fn record_expired() {
        JOIN_RESOLUTIONS_TOTAL.with_label_values(&["expired"]).inc();
    }
}
