//! Room Service
//!
//! Room registry: validity checks for the gateway plus the admin lifecycle.

use std::sync::Arc;

use uuid::Uuid;

use crate::domain::{NewRoom, Room, RoomRepository, RoomType};
use crate::shared::error::AppError;

pub struct RoomService {
    rooms: Arc<dyn RoomRepository>,
}

impl RoomService {
    pub fn new(rooms: Arc<dyn RoomRepository>) -> Self {
        Self { rooms }
    }

    /// The room, if it exists and is open.
    pub async fn get_active(&self, room_id: Uuid) -> Result<Room, AppError> {
        match self.rooms.find_by_id(room_id).await? {
            Some(room) if room.is_open() => Ok(room),
            _ => Err(AppError::NotFound(format!("Room {} not found", room_id))),
        }
    }

    pub async fn list_active(&self) -> Result<Vec<Room>, AppError> {
        self.rooms.list_active().await
    }

    pub async fn create(&self, name: Option<String>, room_type: RoomType) -> Result<Room, AppError> {
        let name = name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        if name.as_ref().is_some_and(|n| n.chars().count() > 100) {
            return Err(AppError::Validation(
                "Room name must be at most 100 characters".into(),
            ));
        }

        let room = self
            .rooms
            .create(&NewRoom {
                id: Uuid::new_v4(),
                name,
                room_type,
            })
            .await?;
        tracing::info!(room_id = %room.id, "Room created");
        Ok(room)
    }

    /// Soft-delete a room. The caller is responsible for evicting live
    /// connections afterwards.
    pub async fn soft_delete(&self, room_id: Uuid, actor: Uuid) -> Result<(), AppError> {
        if !self.rooms.soft_delete(room_id, actor).await? {
            return Err(AppError::NotFound(format!("Room {} not found", room_id)));
        }
        tracing::info!(room_id = %room_id, actor = %actor, "Room soft-deleted");
        Ok(())
    }
}
