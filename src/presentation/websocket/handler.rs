//! WebSocket Connection Handler
//!
//! Upgrades the request, then runs one task per connection: a writer task
//! drains the outbound queue into the socket while the reader loop feeds
//! inbound frames to the gateway in arrival order.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::HeaderMap,
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::time::interval;

use super::gateway::{Gateway, Outbound};
use super::messages::{ClientEvent, ErrorCode, ServerEvent};
use crate::presentation::middleware::auth::bearer_token;
use crate::startup::AppState;

/// How long queued events may take to flush after the reader stops.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Default, Deserialize)]
pub struct ConnectParams {
    pub token: Option<String>,
}

/// WebSocket upgrade handler. The credential comes from `?token=` or the
/// `Authorization` header; neither is required.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Response {
    let token = params
        .token
        .filter(|t| !t.is_empty())
        .or_else(|| bearer_token(&headers));

    let limits = &state.websocket;
    let gateway = Arc::clone(&state.gateway);

    ws.max_message_size(limits.max_message_size)
        .max_frame_size(limits.max_frame_size)
        .on_upgrade(move |socket| handle_socket(socket, gateway, token))
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, gateway: Arc<Gateway>, token: Option<String>) {
    // Split socket for concurrent read/write
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();

    let writer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(t) => t,
                Err(e) => {
                    tracing::error!(event = event.name(), error = %e, "Failed to serialize event");
                    continue;
                }
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    let mut session = gateway.connect(token.as_deref(), tx).await;
    let connection_id = session.connection_id;

    let timeout = gateway.heartbeat_timeout();
    let mut heartbeat_check = interval(gateway.heartbeat_interval());
    heartbeat_check.tick().await; // Skip first immediate tick

    loop {
        tokio::select! {
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        session.heartbeat();
                        match serde_json::from_str::<ClientEvent>(text.as_str()) {
                            Ok(event) => gateway.dispatch(&mut session, event).await,
                            Err(e) => {
                                tracing::debug!(connection_id = %connection_id, error = %e, "Unparseable event");
                                gateway.deliver(vec![Outbound::direct(
                                    connection_id,
                                    ServerEvent::error(ErrorCode::InvalidPayload, format!("Invalid event: {}", e)),
                                )]);
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::debug!(connection_id = %connection_id, "Connection closed by client");
                        break;
                    }
                    Some(Ok(_)) => {
                        // Ping/pong is answered by axum; binary frames are ignored.
                    }
                    Some(Err(e)) => {
                        tracing::debug!(connection_id = %connection_id, error = %e, "WebSocket error");
                        break;
                    }
                }
            }

            _ = heartbeat_check.tick() => {
                if !session.is_alive(timeout) {
                    tracing::info!(connection_id = %connection_id, "Heartbeat timeout, closing connection");
                    break;
                }
            }
        }
    }

    // Unregistering drops the queue sender, which ends the writer.
    gateway.disconnect(session).await;
    if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, writer).await.is_err() {
        tracing::debug!(connection_id = %connection_id, "Writer did not drain in time");
    }
}
