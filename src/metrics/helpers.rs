use std::time::Duration;

use prometheus::{Encoder, TextEncoder};

use super::{
    DELIVERY_ATTEMPTS_TOTAL, DELIVERY_FAILURES_TOTAL, DELIVERY_LATENCY, QUEUE_DEPTH,
    REQUESTS_DELIVERED_TOTAL, REQUESTS_DROPPED_TOTAL, REQUESTS_ENQUEUED_TOTAL,
    RETRIES_SCHEDULED_TOTAL,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Helper struct for recording delivery metrics
pub struct DeliveryMetrics;

impl DeliveryMetrics {
    pub fn record_enqueued() {
        REQUESTS_ENQUEUED_TOTAL.inc();
    }

    /// Record a finished attempt and its latency
    pub fn record_attempt(latency: Duration, success: bool) {
        DELIVERY_ATTEMPTS_TOTAL.inc();
        DELIVERY_LATENCY.observe(latency.as_secs_f64());
        if success {
            REQUESTS_DELIVERED_TOTAL.inc();
        } else {
            DELIVERY_FAILURES_TOTAL.inc();
        }
    }

    pub fn record_retry_scheduled() {
        RETRIES_SCHEDULED_TOTAL.inc();
    }

    pub fn record_dropped() {
        REQUESTS_DROPPED_TOTAL.inc();
    }

    pub fn set_queue_depth(depth: usize) {
        QUEUE_DEPTH.set(depth as i64);
    }
}
