//! Room Handlers

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::application::dto::{CreateRoomRequest, MessageDto, RoomResponse, RosterEntry};
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::shared::validation::validation_error;
use crate::startup::AppState;

/// List open rooms
pub async fn list_rooms(State(state): State<AppState>) -> Result<Json<Vec<RoomResponse>>, AppError> {
    let rooms = state.rooms.list_active().await?;
    Ok(Json(rooms.iter().map(RoomResponse::from).collect()))
}

/// Create a room (admin only)
pub async fn create_room(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<CreateRoomRequest>,
) -> Result<(StatusCode, Json<RoomResponse>), AppError> {
    auth.require_admin()?;
    body.validate().map_err(validation_error)?;

    let room = state.rooms.create(body.name, body.room_type).await?;
    tracing::info!(room_id = %room.id, created_by = %auth.user_id, "Room created via API");

    Ok((StatusCode::CREATED, Json(RoomResponse::from(&room))))
}

/// Latest history of a room as seen by the caller
pub async fn get_room_messages(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(room_id): Path<Uuid>,
) -> Result<Json<Vec<MessageDto>>, AppError> {
    state.rooms.get_active(room_id).await?;
    let messages = state.messages.room_messages(room_id, auth.user_id).await?;
    Ok(Json(messages))
}

/// Current roster, system participant included
pub async fn get_room_members(
    State(state): State<AppState>,
    Path(room_id): Path<Uuid>,
) -> Result<Json<Vec<RosterEntry>>, AppError> {
    state.rooms.get_active(room_id).await?;
    let roster = state.gateway.room_roster(room_id).await?;
    Ok(Json(roster))
}

/// Soft-delete a room and evict its live connections
pub async fn delete_room(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(room_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    auth.require_admin()?;
    state.rooms.soft_delete(room_id, auth.user_id).await?;

    // The row is already closed; a failed eviction only leaves stale presence.
    if let Err(e) = state.gateway.close_room(room_id).await {
        tracing::warn!(room_id = %room_id, error = %e, "Room eviction incomplete");
    }

    Ok(StatusCode::NO_CONTENT)
}
