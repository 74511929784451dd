//! WebSocket Message Types
//!
//! Wire format of the gateway. Every frame is a JSON object
//! `{"event": <name>, "data": <payload>}` in both directions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::application::dto::{MessageDto, MessageParty, RosterEntry};
use crate::application::services::ViolationReason;

/// Inbound events.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    /// Subscribe to the caller's own inbox
    #[serde(rename = "join")]
    Join(JoinPayload),
    #[serde(rename = "joinPublic")]
    JoinPublic(RoomPayload),
    #[serde(rename = "leavePublic")]
    LeavePublic(RoomPayload),
    /// Private 1:1 message
    #[serde(rename = "sendMessage")]
    SendMessage(DirectMessagePayload),
    /// Room broadcast
    #[serde(rename = "sendPublicMessage")]
    SendPublicMessage(RoomMessagePayload),
    /// Room-scoped private message
    #[serde(rename = "sendWhisper")]
    SendWhisper(WhisperPayload),
    #[serde(rename = "readReceipt")]
    ReadReceipt(ReadReceiptPayload),
    #[serde(rename = "typing")]
    Typing(TypingPayload),
    #[serde(rename = "heartbeat")]
    Heartbeat,
}

impl ClientEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Join(_) => "join",
            Self::JoinPublic(_) => "joinPublic",
            Self::LeavePublic(_) => "leavePublic",
            Self::SendMessage(_) => "sendMessage",
            Self::SendPublicMessage(_) => "sendPublicMessage",
            Self::SendWhisper(_) => "sendWhisper",
            Self::ReadReceipt(_) => "readReceipt",
            Self::Typing(_) => "typing",
            Self::Heartbeat => "heartbeat",
        }
    }

    /// Correlation token of a send event.
    pub fn temp_id(&self) -> Option<&str> {
        match self {
            Self::SendMessage(p) => p.temp_id.as_deref(),
            Self::SendPublicMessage(p) => p.temp_id.as_deref(),
            Self::SendWhisper(p) => p.temp_id.as_deref(),
            _ => None,
        }
    }
}

/// What a send payload carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    #[default]
    #[serde(alias = "TEXT")]
    Text,
    #[serde(alias = "IMAGE")]
    Image,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JoinPayload {
    /// Inbox room; must equal the caller's own user id
    pub room: Uuid,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RoomPayload {
    pub room_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Validate)]
pub struct DirectMessagePayload {
    pub receiver_id: Uuid,
    #[validate(length(min = 1, max = 4000, message = "Message must be 1-4000 characters"))]
    pub content: String,
    #[serde(default, rename = "type")]
    pub kind: ContentKind,
    #[serde(default)]
    pub temp_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Validate)]
pub struct RoomMessagePayload {
    pub room_id: Uuid,
    #[validate(length(min = 1, max = 4000, message = "Message must be 1-4000 characters"))]
    pub content: String,
    #[serde(default, rename = "type")]
    pub kind: ContentKind,
    #[serde(default)]
    pub temp_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Validate)]
pub struct WhisperPayload {
    pub room_id: Uuid,
    pub receiver_id: Uuid,
    #[validate(length(min = 1, max = 4000, message = "Message must be 1-4000 characters"))]
    pub content: String,
    #[serde(default, rename = "type")]
    pub kind: ContentKind,
    #[serde(default)]
    pub temp_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReadReceiptPayload {
    pub message_id: Uuid,
}

/// Typing indicator; exactly one of `room_id` or `receiver_id`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TypingPayload {
    #[serde(default)]
    pub room_id: Option<Uuid>,
    #[serde(default)]
    pub receiver_id: Option<Uuid>,
    #[serde(default = "default_true")]
    pub is_typing: bool,
}

fn default_true() -> bool {
    true
}

/// Machine-readable error codes carried by `error` events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    Unauthenticated,
    Forbidden,
    Blocked,
    Muted,
    GuestMediaRestricted,
    SpamDetected,
    ProfanityDetected,
    RoomNotFound,
    NotFound,
    InvalidPayload,
    InternalError,
}

/// Outbound events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    /// First frame of every connection
    #[serde(rename = "ready")]
    Ready { user: Option<MessageParty> },

    /// Private message
    #[serde(rename = "receiveMessage")]
    ReceiveMessage(MessageDto),

    /// Room, whisper and system messages
    #[serde(rename = "receivePublicMessage")]
    ReceivePublicMessage(MessageDto),

    #[serde(rename = "activeUsers:update")]
    ActiveUsersUpdate {
        room_id: Uuid,
        users: Vec<RosterEntry>,
    },

    #[serde(rename = "message_delivered")]
    MessageDelivered {
        temp_id: Option<String>,
        message_id: Uuid,
        created_at: DateTime<Utc>,
    },

    #[serde(rename = "delivery_failed")]
    DeliveryFailed {
        temp_id: Option<String>,
        reason: String,
    },

    #[serde(rename = "messageRead")]
    MessageRead {
        message_id: Uuid,
        reader_id: Uuid,
        read_at: DateTime<Utc>,
    },

    #[serde(rename = "userTyping")]
    UserTyping {
        user_id: Uuid,
        display_name: String,
        room_id: Option<Uuid>,
        is_typing: bool,
    },

    #[serde(rename = "error")]
    Error {
        code: ErrorCode,
        message: String,
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "user_muted")]
    UserMuted {
        reason: ViolationReason,
        muted_until: DateTime<Utc>,
        duration_minutes: i64,
    },

    /// Non-fatal notice, e.g. a message was redacted
    #[serde(rename = "warning")]
    Warning { code: String, message: String },

    #[serde(rename = "heartbeat_ack")]
    HeartbeatAck { timestamp: DateTime<Utc> },

    /// The room was deleted; the connection has been unsubscribed
    #[serde(rename = "room_closed")]
    RoomClosed { room_id: Uuid },
}

impl ServerEvent {
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Error {
            code,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Ready { .. } => "ready",
            Self::ReceiveMessage(_) => "receiveMessage",
            Self::ReceivePublicMessage(_) => "receivePublicMessage",
            Self::ActiveUsersUpdate { .. } => "activeUsers:update",
            Self::MessageDelivered { .. } => "message_delivered",
            Self::DeliveryFailed { .. } => "delivery_failed",
            Self::MessageRead { .. } => "messageRead",
            Self::UserTyping { .. } => "userTyping",
            Self::Error { .. } => "error",
            Self::UserMuted { .. } => "user_muted",
            Self::Warning { .. } => "warning",
            Self::HeartbeatAck { .. } => "heartbeat_ack",
            Self::RoomClosed { .. } => "room_closed",
        }
    }
}
