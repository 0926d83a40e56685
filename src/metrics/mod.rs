//! Prometheus metrics for the delivery queue.
//!
//! - Throughput (enqueued, delivered, dropped)
//! - Attempt outcomes and scheduled retries
//! - Queue depth and delivery latency

mod helpers;

pub use helpers::{encode_metrics, DeliveryMetrics};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_gauge, Histogram, IntCounter, IntGauge,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "duckt";

lazy_static! {
    /// Records accepted by `send_request`
    pub static ref REQUESTS_ENQUEUED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_requests_enqueued_total", METRIC_PREFIX),
        "Total records accepted onto the delivery queue"
    ).unwrap();

    /// Records accepted by the collector
    pub static ref REQUESTS_DELIVERED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_requests_delivered_total", METRIC_PREFIX),
        "Total records delivered to the collector"
    ).unwrap();

    /// Records discarded after exhausting retries
    pub static ref REQUESTS_DROPPED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_requests_dropped_total", METRIC_PREFIX),
        "Total records dropped after exhausting retries"
    ).unwrap();

    /// Every delivery attempt, successful or not
    pub static ref DELIVERY_ATTEMPTS_TOTAL: IntCounter = register_int_counter!(
        format!("{}_delivery_attempts_total", METRIC_PREFIX),
        "Total delivery attempts"
    ).unwrap();

    pub static ref DELIVERY_FAILURES_TOTAL: IntCounter = register_int_counter!(
        format!("{}_delivery_failures_total", METRIC_PREFIX),
        "Total failed delivery attempts"
    ).unwrap();

    pub static ref RETRIES_SCHEDULED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_retries_scheduled_total", METRIC_PREFIX),
        "Total retries scheduled with backoff"
    ).unwrap();

    /// Items currently held by the drain worker (excludes pending retry timers)
    pub static ref QUEUE_DEPTH: IntGauge = register_int_gauge!(
        format!("{}_queue_depth", METRIC_PREFIX),
        "Records currently waiting in the delivery queue"
    ).unwrap();

    /// Duration of a single delivery attempt
    pub static ref DELIVERY_LATENCY: Histogram = register_histogram!(
        format!("{}_delivery_latency_seconds", METRIC_PREFIX),
        "Delivery attempt latency in seconds",
        vec![0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    ).unwrap();
}
