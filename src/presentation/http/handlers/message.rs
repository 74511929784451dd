//! Message Handlers

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use uuid::Uuid;

use crate::application::dto::MessageDto;
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::startup::AppState;

/// Direct messages between the caller and another user
pub async fn get_private_messages(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<MessageDto>>, AppError> {
    let messages = state.messages.private_messages(auth.user_id, user_id).await?;
    Ok(Json(messages))
}

/// Latest message per conversation partner
pub async fn get_inbox(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Vec<MessageDto>>, AppError> {
    let messages = state.messages.inbox(auth.user_id).await?;
    Ok(Json(messages))
}
