//! Prometheus Metrics Module
//!
//! Provides application-wide metrics collection using Prometheus.
//!
//! # Metrics Collected
//! - HTTP request counts and latency by method, path, and status
//! - Live gateway connections (connected / identified)
//! - Chat messages accepted, by message type
//! - Moderation actions, by reason
//! - Deliveries suppressed by the block graph
//! - Store failures on the send path

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, GaugeVec, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry,
    TextEncoder,
};

const NAMESPACE: &str = "chat_gateway";

/// Global metrics registry
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// HTTP request counter - tracks total requests by method, path, and status code
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("http_requests_total", "Total number of HTTP requests").namespace(NAMESPACE),
        &["method", "path", "status"],
    )
    .expect("Failed to create HTTP_REQUESTS_TOTAL metric")
});

/// HTTP request latency histogram - tracks request duration in seconds
pub static HTTP_REQUEST_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    let buckets = vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0];
    HistogramVec::new(
        HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request latency in seconds",
        )
        .namespace(NAMESPACE)
        .buckets(buckets),
        &["method", "path"],
    )
    .expect("Failed to create HTTP_REQUEST_DURATION_SECONDS metric")
});

/// Live gateway connections
pub static GATEWAY_CONNECTIONS_ACTIVE: Lazy<GaugeVec> = Lazy::new(|| {
    GaugeVec::new(
        Opts::new(
            "gateway_connections_active",
            "Number of live gateway connections",
        )
        .namespace(NAMESPACE),
        &["state"], // "connected", "identified"
    )
    .expect("Failed to create GATEWAY_CONNECTIONS_ACTIVE metric")
});

/// Accepted chat messages by type
pub static MESSAGES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("messages_total", "Chat messages accepted by the gateway").namespace(NAMESPACE),
        &["type"],
    )
    .expect("Failed to create MESSAGES_TOTAL metric")
});

/// Moderation actions by reason
pub static MODERATION_ACTIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("moderation_actions_total", "Mutes applied by the moderation engine")
            .namespace(NAMESPACE),
        &["reason"],
    )
    .expect("Failed to create MODERATION_ACTIONS_TOTAL metric")
});

/// Deliveries skipped because the recipient blocked the sender
pub static BLOCKED_DELIVERIES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::with_opts(
        Opts::new(
            "blocked_deliveries_total",
            "Per-recipient deliveries suppressed by the block graph",
        )
        .namespace(NAMESPACE),
    )
    .expect("Failed to create BLOCKED_DELIVERIES_TOTAL metric")
});

/// Store failures on the send path
pub static PERSISTENCE_FAILURES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("persistence_failures_total", "Failed writes or reads against a store")
            .namespace(NAMESPACE),
        &["store"], // "database", "presence"
    )
    .expect("Failed to create PERSISTENCE_FAILURES_TOTAL metric")
});

/// Register all metrics with the registry
fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .expect("Failed to register HTTP_REQUESTS_TOTAL");
    registry
        .register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()))
        .expect("Failed to register HTTP_REQUEST_DURATION_SECONDS");
    registry
        .register(Box::new(GATEWAY_CONNECTIONS_ACTIVE.clone()))
        .expect("Failed to register GATEWAY_CONNECTIONS_ACTIVE");
    registry
        .register(Box::new(MESSAGES_TOTAL.clone()))
        .expect("Failed to register MESSAGES_TOTAL");
    registry
        .register(Box::new(MODERATION_ACTIONS_TOTAL.clone()))
        .expect("Failed to register MODERATION_ACTIONS_TOTAL");
    registry
        .register(Box::new(BLOCKED_DELIVERIES_TOTAL.clone()))
        .expect("Failed to register BLOCKED_DELIVERIES_TOTAL");
    registry
        .register(Box::new(PERSISTENCE_FAILURES_TOTAL.clone()))
        .expect("Failed to register PERSISTENCE_FAILURES_TOTAL");
}

/// Collect and encode all metrics as Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Helper to record HTTP request metrics
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration_secs);
}

/// Helper to update gateway connection counts
pub fn set_gateway_connections(connected: usize, identified: usize) {
    GATEWAY_CONNECTIONS_ACTIVE
        .with_label_values(&["connected"])
        .set(connected as f64);
    GATEWAY_CONNECTIONS_ACTIVE
        .with_label_values(&["identified"])
        .set(identified as f64);
}

pub fn record_message(message_type: &str) {
    MESSAGES_TOTAL.with_label_values(&[message_type]).inc();
}

pub fn record_moderation_action(reason: &str) {
    MODERATION_ACTIONS_TOTAL.with_label_values(&[reason]).inc();
}

pub fn record_blocked_delivery() {
    BLOCKED_DELIVERIES_TOTAL.inc();
}

pub fn record_persistence_failure(store: &str) {
    PERSISTENCE_FAILURES_TOTAL.with_label_values(&[store]).inc();
}
