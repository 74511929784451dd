//! Message Service
//!
//! Persistence with at-rest encryption, client transformation, and the
//! viewer-aware history queries.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::application::dto::{MessageDto, MessageParty};
use crate::domain::{
    BlockRepository, Message, MessageRepository, MessageType, NewMessage, User, UserRepository,
    HIDDEN_MESSAGE_PLACEHOLDER,
};
use crate::infrastructure::crypto::ContentCipher;
use crate::shared::error::AppError;

/// Messages returned by every history query.
pub const HISTORY_LIMIT: i64 = 100;

/// Save request. `content` is plaintext.
#[derive(Debug, Clone)]
pub struct SaveMessage {
    pub sender_id: Uuid,
    pub receiver_id: Option<Uuid>,
    pub room_id: Option<Uuid>,
    pub content: String,
    pub message_type: MessageType,
    pub is_private: bool,
    pub mentions: Vec<Uuid>,
    pub is_hidden: bool,
    pub hidden_reason: Option<String>,
}

/// Message store.
pub struct MessageService {
    messages: Arc<dyn MessageRepository>,
    users: Arc<dyn UserRepository>,
    blocks: Arc<dyn BlockRepository>,
    cipher: ContentCipher,
}

impl MessageService {
    pub fn new(
        messages: Arc<dyn MessageRepository>,
        users: Arc<dyn UserRepository>,
        blocks: Arc<dyn BlockRepository>,
        cipher: ContentCipher,
    ) -> Self {
        Self {
            messages,
            users,
            blocks,
            cipher,
        }
    }

    /// Persist a message, encrypting content for encrypted types.
    #[tracing::instrument(skip(self, request), fields(sender_id = %request.sender_id, kind = %request.message_type))]
    pub async fn save(&self, request: SaveMessage) -> Result<Message, AppError> {
        let content = if request.message_type.is_encrypted() {
            self.cipher
                .encrypt(&request.content)
                .map_err(|e| AppError::Internal(format!("Failed to encrypt message: {}", e)))?
        } else {
            request.content
        };

        let new_message = NewMessage {
            id: Uuid::now_v7(),
            sender_id: request.sender_id,
            receiver_id: request.receiver_id,
            room_id: request.room_id,
            content,
            message_type: request.message_type,
            mentions: request.mentions,
            is_private: request.is_private,
            is_hidden: request.is_hidden,
            hidden_reason: request.hidden_reason,
        };

        let message = self.messages.create(&new_message).await?;
        tracing::debug!(message_id = %message.id, "Message persisted");
        Ok(message)
    }

    /// Display content of a stored message.
    pub fn display_content(&self, message: &Message) -> String {
        if message.is_hidden {
            HIDDEN_MESSAGE_PLACEHOLDER.to_string()
        } else if message.message_type.is_encrypted() {
            self.cipher.decrypt_or_raw(&message.content)
        } else {
            message.content.clone()
        }
    }

    /// Build the client view of a message from already-loaded parties.
    pub fn to_dto(&self, message: &Message, sender: &User, receiver: Option<&User>) -> MessageDto {
        MessageDto {
            id: message.id,
            room_id: message.room_id,
            sender: MessageParty::from(sender),
            receiver: receiver.map(MessageParty::from),
            content: self.display_content(message),
            message_type: message.message_type.as_str().to_string(),
            mentions: message.mentions.clone(),
            is_private: message.is_private,
            is_hidden: message.is_hidden,
            hidden_reason: message.hidden_reason.clone(),
            read_at: message.read_at,
            created_at: message.created_at,
        }
    }

    /// Transform a single message, loading its parties.
    pub async fn transform_for_client(&self, message: &Message) -> Result<MessageDto, AppError> {
        let mut dtos = self.transform_many(std::slice::from_ref(message)).await?;
        dtos.pop()
            .ok_or_else(|| AppError::NotFound(format!("Sender of message {} not found", message.id)))
    }

    /// Transform a batch with one identity lookup. Messages whose sender no
    /// longer exists are dropped.
    pub async fn transform_many(&self, messages: &[Message]) -> Result<Vec<MessageDto>, AppError> {
        let mut ids: Vec<Uuid> = messages
            .iter()
            .flat_map(|m| std::iter::once(m.sender_id).chain(m.receiver_id))
            .collect();
        ids.sort_unstable();
        ids.dedup();

        let users: HashMap<Uuid, User> = self
            .users
            .find_many(&ids)
            .await?
            .into_iter()
            .map(|u| (u.id, u))
            .collect();

        Ok(messages
            .iter()
            .filter_map(|m| {
                let sender = users.get(&m.sender_id)?;
                let receiver = m.receiver_id.and_then(|id| users.get(&id));
                Some(self.to_dto(m, sender, receiver))
            })
            .collect())
    }

    /// Latest room history visible to `viewer`, oldest first. Senders the
    /// viewer has blocked are excluded.
    pub async fn room_messages(&self, room_id: Uuid, viewer: Uuid) -> Result<Vec<MessageDto>, AppError> {
        let blocked = self.blocks.find_blocked(viewer).await?;
        let messages = self
            .messages
            .find_room_history(room_id, viewer, &blocked, HISTORY_LIMIT)
            .await?;
        self.transform_many(&messages).await
    }

    /// Latest direct messages between two users. Empty when `user_a` has
    /// blocked `user_b`.
    pub async fn private_messages(&self, user_a: Uuid, user_b: Uuid) -> Result<Vec<MessageDto>, AppError> {
        if self.blocks.is_blocked(user_a, user_b).await? {
            return Ok(Vec::new());
        }
        let messages = self
            .messages
            .find_conversation(user_a, user_b, HISTORY_LIMIT)
            .await?;
        self.transform_many(&messages).await
    }

    /// Latest message per conversation partner, excluding blocked partners.
    pub async fn inbox(&self, user_id: Uuid) -> Result<Vec<MessageDto>, AppError> {
        let blocked = self.blocks.find_blocked(user_id).await?;
        let messages = self.messages.find_inbox(user_id, &blocked).await?;
        self.transform_many(&messages).await
    }

    /// Mark a direct message read by its receiver. Returns the message when
    /// this call changed it.
    pub async fn mark_read(&self, message_id: Uuid, reader: Uuid) -> Result<Option<Message>, AppError> {
        if !self.messages.mark_read(message_id, reader).await? {
            return Ok(None);
        }
        self.messages.find_by_id(message_id).await
    }

    /// Delete messages older than `days`.
    pub async fn purge_older_than(&self, days: i64) -> Result<u64, AppError> {
        let cutoff = Utc::now() - Duration::days(days.max(1));
        let removed = self.messages.delete_older_than(cutoff).await?;
        if removed > 0 {
            tracing::info!(removed, days, "Purged expired messages");
        }
        Ok(removed)
    }
}
