//! Message entity and repository trait.
//!
//! Maps to the `messages` table in the database schema.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shared::error::AppError;

/// Content shown in place of any message hidden by moderation.
pub const HIDDEN_MESSAGE_PLACEHOLDER: &str =
    "This message was hidden because it contained links or social media handles.";

/// Message types matching the PostgreSQL ENUM `message_type`.
///
/// Database definition:
/// ```sql
/// CREATE TYPE message_type AS ENUM (
///     'public',   -- Room broadcast
///     'private',  -- 1:1 conversation
///     'whisper',  -- Direct message inside a room context
///     'mention',  -- Room broadcast that resolved at least one @username
///     'image',    -- Media payload (room or private)
///     'join',     -- Room join announcement
///     'welcome'   -- Welcome message shown to a joiner
/// );
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageType {
    #[default]
    Public,
    Private,
    Whisper,
    Mention,
    Image,
    Join,
    Welcome,
}

impl MessageType {
    /// Convert from database string representation.
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "private" => Self::Private,
            "whisper" => Self::Whisper,
            "mention" => Self::Mention,
            "image" => Self::Image,
            "join" => Self::Join,
            "welcome" => Self::Welcome,
            _ => Self::Public,
        }
    }

    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
            Self::Whisper => "whisper",
            Self::Mention => "mention",
            Self::Image => "image",
            Self::Join => "join",
            Self::Welcome => "welcome",
        }
    }

    /// Types whose content is stored encrypted at rest.
    pub fn is_encrypted(&self) -> bool {
        matches!(self, Self::Private | Self::Image | Self::Whisper)
    }

    /// System messages generated by the gateway rather than a user.
    pub fn is_system(&self) -> bool {
        matches!(self, Self::Join | Self::Welcome)
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A persisted chat message.
///
/// Maps to the `messages` table:
/// - id: UUID PRIMARY KEY (v7, time ordered)
/// - sender_id: UUID NOT NULL REFERENCES users(id)
/// - receiver_id: UUID NULL REFERENCES users(id)
/// - room_id: UUID NULL REFERENCES rooms(id)
/// - content: TEXT NOT NULL (ciphertext for encrypted types)
/// - message_type: message_type NOT NULL
/// - mentions: UUID[] NOT NULL DEFAULT '{}'
/// - is_private: BOOLEAN NOT NULL (delivery restricted to sender/receiver)
/// - is_hidden: BOOLEAN NOT NULL (moderation placeholder)
/// - hidden_reason: TEXT NULL
/// - read_at: TIMESTAMPTZ NULL
/// - created_at: TIMESTAMPTZ NOT NULL DEFAULT NOW()
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Option<Uuid>,
    pub room_id: Option<Uuid>,

    /// Stored content; ciphertext when `message_type.is_encrypted()`
    pub content: String,

    #[serde(rename = "type")]
    pub message_type: MessageType,

    pub mentions: Vec<Uuid>,
    pub is_private: bool,
    pub is_hidden: bool,
    pub hidden_reason: Option<String>,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Whether `user_id` is one side of this message.
    pub fn involves(&self, user_id: Uuid) -> bool {
        self.sender_id == user_id || self.receiver_id == Some(user_id)
    }
}

/// Insert payload for a new message. Content is already in its stored form.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Option<Uuid>,
    pub room_id: Option<Uuid>,
    pub content: String,
    pub message_type: MessageType,
    pub mentions: Vec<Uuid>,
    pub is_private: bool,
    pub is_hidden: bool,
    pub hidden_reason: Option<String>,
}

/// Repository trait for Message data access operations.
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Append a message and return the stored row.
    async fn create(&self, message: &NewMessage) -> Result<Message, AppError>;

    /// Find a message by id.
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Message>, AppError>;

    /// Latest `limit` room messages visible to `viewer`, ascending by time.
    ///
    /// Visible means broadcast messages of the room plus delivery-restricted
    /// ones where the viewer is sender or receiver. Messages sent by anyone in
    /// `excluded_senders` are dropped.
    async fn find_room_history(
        &self,
        room_id: Uuid,
        viewer: Uuid,
        excluded_senders: &[Uuid],
        limit: i64,
    ) -> Result<Vec<Message>, AppError>;

    /// Latest `limit` direct messages between two users, ascending by time.
    async fn find_conversation(
        &self,
        user_a: Uuid,
        user_b: Uuid,
        limit: i64,
    ) -> Result<Vec<Message>, AppError>;

    /// Latest direct message per conversation partner, newest first.
    async fn find_inbox(
        &self,
        user_id: Uuid,
        excluded_partners: &[Uuid],
    ) -> Result<Vec<Message>, AppError>;

    /// Mark a direct message read by its receiver. Returns false when
    /// nothing matched.
    async fn mark_read(&self, id: Uuid, reader: Uuid) -> Result<bool, AppError>;

    /// Delete messages created before `cutoff`. Returns the number removed.
    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError>;
}
