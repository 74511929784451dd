//! Presence Handlers
//!
//! Presence is decoration: store failures read as offline rather than erroring.

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::application::dto::{OnlineUsersResponse, PresenceResponse};
use crate::infrastructure::cache::PresenceStatus;
use crate::startup::AppState;

pub async fn get_online_users(State(state): State<AppState>) -> Json<OnlineUsersResponse> {
    let mut users: Vec<Uuid> = match state.presence.online_users().await {
        Ok(users) => users.into_iter().collect(),
        Err(e) => {
            tracing::warn!(error = %e, "Online scan failed");
            Vec::new()
        }
    };
    users.sort_unstable();

    Json(OnlineUsersResponse {
        count: users.len(),
        users,
    })
}

pub async fn get_user_presence(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Json<PresenceResponse> {
    let status = state.presence.status(user_id).await.unwrap_or_else(|e| {
        tracing::debug!(user_id = %user_id, error = %e, "Presence lookup failed");
        PresenceStatus::Offline
    });

    Json(PresenceResponse { user_id, status })
}
