//! Gateway Event Tests
//!
//! Drive the gateway through `dispatch` exactly as the socket loop does and
//! inspect what each connection received.

mod messaging_tests;
mod moderation_tests;

use chat_gateway::application::dto::MessageDto;
use chat_gateway::presentation::websocket::messages::{
    DirectMessagePayload, JoinPayload, ReadReceiptPayload, RoomMessagePayload, RoomPayload,
    TypingPayload, WhisperPayload,
};
use chat_gateway::presentation::websocket::{ClientEvent, ContentKind, ErrorCode, ServerEvent};
use uuid::Uuid;

pub fn join_inbox(user_id: Uuid) -> ClientEvent {
    ClientEvent::Join(JoinPayload { room: user_id })
}

pub fn join_public(room_id: Uuid) -> ClientEvent {
    ClientEvent::JoinPublic(RoomPayload { room_id })
}

pub fn leave_public(room_id: Uuid) -> ClientEvent {
    ClientEvent::LeavePublic(RoomPayload { room_id })
}

pub fn room_text(room_id: Uuid, content: &str) -> ClientEvent {
    room_message(room_id, content, ContentKind::Text, None)
}

pub fn room_message(
    room_id: Uuid,
    content: &str,
    kind: ContentKind,
    temp_id: Option<&str>,
) -> ClientEvent {
    ClientEvent::SendPublicMessage(RoomMessagePayload {
        room_id,
        content: content.to_string(),
        kind,
        temp_id: temp_id.map(str::to_string),
    })
}

pub fn direct(receiver_id: Uuid, content: &str, temp_id: Option<&str>) -> ClientEvent {
    ClientEvent::SendMessage(DirectMessagePayload {
        receiver_id,
        content: content.to_string(),
        kind: ContentKind::Text,
        temp_id: temp_id.map(str::to_string),
    })
}

pub fn whisper(room_id: Uuid, receiver_id: Uuid, content: &str) -> ClientEvent {
    ClientEvent::SendWhisper(WhisperPayload {
        room_id,
        receiver_id,
        content: content.to_string(),
        kind: ContentKind::Text,
        temp_id: None,
    })
}

pub fn read_receipt(message_id: Uuid) -> ClientEvent {
    ClientEvent::ReadReceipt(ReadReceiptPayload { message_id })
}

pub fn typing_in(room_id: Uuid, is_typing: bool) -> ClientEvent {
    ClientEvent::Typing(TypingPayload {
        room_id: Some(room_id),
        receiver_id: None,
        is_typing,
    })
}

pub fn typing_to(receiver_id: Uuid, is_typing: bool) -> ClientEvent {
    ClientEvent::Typing(TypingPayload {
        room_id: None,
        receiver_id: Some(receiver_id),
        is_typing,
    })
}

/// Error codes among the events.
pub fn error_codes(events: &[ServerEvent]) -> Vec<ErrorCode> {
    events
        .iter()
        .filter_map(|e| match e {
            ServerEvent::Error { code, .. } => Some(*code),
            _ => None,
        })
        .collect()
}

/// Room and whisper message payloads among the events.
pub fn public_messages(events: &[ServerEvent]) -> Vec<&MessageDto> {
    events
        .iter()
        .filter_map(|e| match e {
            ServerEvent::ReceivePublicMessage(dto) => Some(dto),
            _ => None,
        })
        .collect()
}

/// Private message payloads among the events.
pub fn private_messages(events: &[ServerEvent]) -> Vec<&MessageDto> {
    events
        .iter()
        .filter_map(|e| match e {
            ServerEvent::ReceiveMessage(dto) => Some(dto),
            _ => None,
        })
        .collect()
}
