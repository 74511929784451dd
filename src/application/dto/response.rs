//! Response DTOs
//!
//! Client-facing shapes shared by the gateway events and the HTTP surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Room, RoomType, User};

/// Sender or receiver as shown to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageParty {
    pub id: Uuid,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

impl From<&User> for MessageParty {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            display_name: user.display_name(),
            avatar_url: user.avatar_url.clone(),
        }
    }
}

/// A message after client transformation: placeholder applied, content
/// decrypted, parties denormalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageDto {
    pub id: Uuid,
    pub room_id: Option<Uuid>,
    pub sender: MessageParty,
    pub receiver: Option<MessageParty>,
    pub content: String,
    #[serde(rename = "type")]
    pub message_type: String,
    pub mentions: Vec<Uuid>,
    pub is_private: bool,
    pub is_hidden: bool,
    pub hidden_reason: Option<String>,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// One row of a room roster.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RosterEntry {
    pub id: Uuid,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub is_system: bool,
}

/// Identity of the always-present system participant.
pub const SYSTEM_PARTICIPANT_ID: Uuid = Uuid::nil();
pub const SYSTEM_PARTICIPANT_NAME: &str = "System";

impl RosterEntry {
    /// Synthetic participant listed in every room.
    pub fn system() -> Self {
        Self {
            id: SYSTEM_PARTICIPANT_ID,
            display_name: SYSTEM_PARTICIPANT_NAME.to_string(),
            avatar_url: None,
            is_system: true,
        }
    }
}

impl From<&User> for RosterEntry {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            display_name: user.display_name(),
            avatar_url: user.avatar_url.clone(),
            is_system: false,
        }
    }
}

/// Room response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomResponse {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub room_type: RoomType,
    pub created_at: DateTime<Utc>,
}

impl From<&Room> for RoomResponse {
    fn from(room: &Room) -> Self {
        Self {
            id: room.id,
            name: room.display_name(),
            room_type: room.room_type,
            created_at: room.created_at,
        }
    }
}

/// Presence response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceResponse {
    pub user_id: Uuid,
    pub status: crate::infrastructure::cache::PresenceStatus,
}

/// Users with a live presence marker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnlineUsersResponse {
    pub count: usize,
    pub users: Vec<Uuid>,
}
