//! Route Configuration
//!
//! Configures all HTTP routes for the API.

use axum::{
    middleware,
    response::IntoResponse,
    routing::{delete, get},
    Router,
};

use super::handlers;
use crate::infrastructure::metrics;
use crate::presentation::middleware::{auth_middleware, track_metrics};
use crate::presentation::websocket::ws_handler;
use crate::startup::AppState;

/// Create the main API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", api_routes(state.clone()))
        // Authentication is optional here; anonymous sockets are allowed.
        .route("/gateway", get(ws_handler))
        // Health check endpoints
        .route("/health", get(handlers::health::health_check))
        .route("/health/live", get(handlers::health::liveness))
        .route("/health/ready", get(handlers::health::readiness))
        // Prometheus metrics endpoint
        .route("/metrics", get(metrics_handler))
        .route_layer(middleware::from_fn(track_metrics))
        .with_state(state)
}

/// Prometheus metrics endpoint handler
async fn metrics_handler() -> impl IntoResponse {
    let metrics = metrics::gather_metrics();
    (
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        metrics,
    )
}

/// API v1 routes (all protected)
fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .nest("/rooms", room_routes())
        .nest("/messages", message_routes())
        .route("/inbox", get(handlers::message::get_inbox))
        .nest("/presence", presence_routes())
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

fn room_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::room::list_rooms).post(handlers::room::create_room),
        )
        .route(
            "/{room_id}",
            delete(handlers::room::delete_room),
        )
        .route("/{room_id}/messages", get(handlers::room::get_room_messages))
        .route("/{room_id}/members", get(handlers::room::get_room_members))
}

fn message_routes() -> Router<AppState> {
    Router::new().route(
        "/private/{user_id}",
        get(handlers::message::get_private_messages),
    )
}

fn presence_routes() -> Router<AppState> {
    Router::new()
        .route("/online", get(handlers::presence::get_online_users))
        .route("/{user_id}", get(handlers::presence::get_user_presence))
}
