//! Request DTOs
//!
//! Data structures for API request bodies.

use serde::Deserialize;
use validator::Validate;

use crate::domain::RoomType;

/// Create room request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateRoomRequest {
    #[validate(length(max = 100, message = "Room name must be at most 100 characters"))]
    pub name: Option<String>,

    #[serde(default, rename = "type")]
    pub room_type: RoomType,
}
