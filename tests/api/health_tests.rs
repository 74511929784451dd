//! Health Check API Tests

use std::sync::atomic::Ordering;

use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::Value;

use crate::common::*;

/// Basic health check returns 200 with a status field
#[tokio::test]
async fn test_health_check_returns_ok() {
    let server = Harness::new().server();

    let response = server.get("/health").await;

    response.assert_status_ok();
    let json: Value = response.json();
    assert_eq!(json["status"], "healthy");
}

#[tokio::test]
async fn test_liveness_probe() {
    let server = Harness::new().server();

    let json: Value = server.get("/health/live").await.json();

    assert_eq!(json["status"], "alive");
}

#[tokio::test]
async fn test_readiness_reports_every_dependency() {
    // Arrange
    let harness = Harness::new();
    let alice = harness.add_user("alice");
    let _client = harness.connect(Some(&alice)).await;
    let _anonymous = harness.connect(None).await;
    let server = harness.server();

    // Act
    let response = server.get("/health/ready").await;

    // Assert
    response.assert_status_ok();
    let json: Value = response.json();
    assert_eq!(json["checks"]["presence_store"]["status"], "healthy");
    assert_eq!(json["checks"]["gateway"]["active_connections"], 2);
    assert_eq!(json["checks"]["gateway"]["identified_connections"], 1);
}

/// Readiness fails when the message store is unreachable
#[tokio::test]
async fn test_readiness_unavailable_without_message_store() {
    let harness = Harness::new();
    harness.probe.healthy.store(false, Ordering::SeqCst);
    let server = harness.server();

    let response = server.get("/health/ready").await;

    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    let json: Value = response.json();
    assert_eq!(json["status"], "unhealthy");
    assert_eq!(json["checks"]["message_store"]["status"], "unhealthy");
}

#[tokio::test]
async fn test_metrics_endpoint_serves_prometheus_text() {
    let server = Harness::new().server();
    server.get("/health").await;

    let response = server.get("/metrics").await;

    response.assert_status_ok();
    assert!(response.text().contains("http_requests_total"));
}
