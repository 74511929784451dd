//! Authentication API Tests
//!
//! Every `/api/v1` route requires a bearer token issued for the shared
//! secret.

use axum::http::StatusCode;
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use pretty_assertions::assert_eq;
use serde_json::Value;
use uuid::Uuid;

use chat_gateway::presentation::middleware::Claims;

use crate::common::*;

fn signed(secret: &str, sub: &str, exp_offset: i64) -> String {
    let now = Utc::now().timestamp();
    encode(
        &Header::default(),
        &Claims {
            sub: sub.to_string(),
            exp: now + exp_offset,
            iat: now,
            role: None,
        },
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

/// Missing header is rejected with the error body
#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let server = Harness::new().server();

    let response = server.get("/api/v1/rooms").await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    let json: Value = response.json();
    assert_eq!(json["code"], 10003);
}

#[tokio::test]
async fn test_valid_token_is_accepted() {
    let harness = Harness::new();
    let alice = harness.add_user("alice");
    let server = harness.server();

    let response = server
        .get("/api/v1/rooms")
        .authorization_bearer(harness.token(alice.id))
        .await;

    response.assert_status_ok();
}

#[tokio::test]
async fn test_expired_token_is_unauthorized() {
    let server = Harness::new().server();
    let token = signed(JWT_SECRET, &Uuid::new_v4().to_string(), -3600);

    let response = server.get("/api/v1/inbox").authorization_bearer(token).await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    let json: Value = response.json();
    assert_eq!(json["message"], "Token expired");
}

#[tokio::test]
async fn test_token_signed_with_other_secret_is_unauthorized() {
    let server = Harness::new().server();
    let token = signed("some-other-secret-that-is-long-enough!!", &Uuid::new_v4().to_string(), 3600);

    let response = server.get("/api/v1/inbox").authorization_bearer(token).await;

    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_non_uuid_subject_is_unauthorized() {
    let server = Harness::new().server();
    let token = signed(JWT_SECRET, "user-42", 3600);

    let response = server.get("/api/v1/inbox").authorization_bearer(token).await;

    response.assert_status(StatusCode::UNAUTHORIZED);
}

/// Health and metrics stay public
#[tokio::test]
async fn test_probes_do_not_require_token() {
    let server = Harness::new().server();

    server.get("/health/live").await.assert_status_ok();
    server.get("/metrics").await.assert_status_ok();
}
