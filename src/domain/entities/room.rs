//! Room entity and repository trait.
//!
//! Maps to the `rooms` table. Rooms are never hard-deleted.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shared::error::AppError;

/// Room visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum RoomType {
    #[default]
    #[serde(alias = "public")]
    Public,
    #[serde(alias = "private")]
    Private,
}

impl RoomType {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "private" => Self::Private,
            _ => Self::Public,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
        }
    }
}

/// Durable room metadata.
///
/// Maps to the `rooms` table:
/// - id: UUID PRIMARY KEY
/// - name: VARCHAR(100) NULL
/// - room_type: VARCHAR(16) NOT NULL DEFAULT 'public'
/// - is_active: BOOLEAN NOT NULL DEFAULT TRUE
/// - is_deleted: BOOLEAN NOT NULL DEFAULT FALSE
/// - deleted_at: TIMESTAMPTZ NULL
/// - deleted_by: UUID NULL
/// - created_at: TIMESTAMPTZ NOT NULL DEFAULT NOW()
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub id: Uuid,
    pub name: Option<String>,
    pub room_type: RoomType,
    pub is_active: bool,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Room {
    /// Stored name, or a stable name derived from the id prefix.
    pub fn display_name(&self) -> String {
        match self.name.as_deref() {
            Some(name) if !name.trim().is_empty() => name.to_string(),
            _ => {
                let simple = self.id.simple().to_string();
                format!("Room {}", &simple[..8])
            }
        }
    }

    /// Whether clients may join or post in this room.
    pub fn is_open(&self) -> bool {
        self.is_active && !self.is_deleted
    }
}

/// Insert payload for a new room.
#[derive(Debug, Clone)]
pub struct NewRoom {
    pub id: Uuid,
    pub name: Option<String>,
    pub room_type: RoomType,
}

/// Repository trait for Room data access operations.
#[async_trait]
pub trait RoomRepository: Send + Sync {
    /// Find a room by id, including soft-deleted rooms.
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Room>, AppError>;

    /// All rooms that are active and not deleted.
    async fn list_active(&self) -> Result<Vec<Room>, AppError>;

    /// Create a room.
    async fn create(&self, room: &NewRoom) -> Result<Room, AppError>;

    /// Soft-delete a room. Returns false if it was already deleted or missing.
    async fn soft_delete(&self, id: Uuid, actor: Uuid) -> Result<bool, AppError>;
}
