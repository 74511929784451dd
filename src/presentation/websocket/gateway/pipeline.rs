//! Send pipeline shared by private messages, room messages and whispers.
//!
//! Order: identity, payload, target and block checks, guest media, mute,
//! spam, link redaction, profanity, mentions, persist, side effects, fan-out.
//! Each step short-circuits except link redaction, which rewrites the
//! message and lets it through.

use std::collections::HashSet;
use std::sync::Arc;

use uuid::Uuid;
use validator::Validate;

use super::{Gateway, GatewayError, Outbound, RecipientFilter};
use crate::application::services::{MuteRecord, SaveMessage, ViolationReason};
use crate::domain::services::extract_mentions;
use crate::domain::{
    Message, MessageType, Notification, NotificationKind, Room, User, HIDDEN_MESSAGE_PLACEHOLDER,
};
use crate::infrastructure::metrics;
use crate::shared::validation::validation_error;
use crate::presentation::websocket::messages::{
    ContentKind, DirectMessagePayload, RoomMessagePayload, ServerEvent, WhisperPayload,
};
use crate::presentation::websocket::registry::Topic;
use crate::presentation::websocket::session::{ConnectionId, Session};

/// Content after moderation, plus notices owed to the sender.
struct Moderated {
    content: String,
    is_hidden: bool,
    hidden_reason: Option<String>,
    notices: Vec<ServerEvent>,
}

fn check_payload<T: Validate>(payload: &T, content: &str) -> Result<(), GatewayError> {
    payload
        .validate()
        .map_err(|e| GatewayError::from(validation_error(e)))?;
    if content.trim().is_empty() {
        return Err(GatewayError::InvalidPayload("Message cannot be empty".into()));
    }
    Ok(())
}

fn delivered(connection: ConnectionId, temp_id: Option<String>, message: &Message) -> Outbound {
    Outbound::direct(
        connection,
        ServerEvent::MessageDelivered {
            temp_id,
            message_id: message.id,
            created_at: message.created_at,
        },
    )
}

impl Gateway {
    pub(super) async fn send_private(
        &self,
        session: &mut Session,
        payload: DirectMessagePayload,
    ) -> Result<Vec<Outbound>, GatewayError> {
        let sender = Self::identity(session)?.clone();
        let connection = session.connection_id;
        check_payload(&payload, &payload.content)?;

        if payload.receiver_id == sender.id {
            return Err(GatewayError::InvalidPayload("You cannot message yourself".into()));
        }
        let receiver = self.recipient(payload.receiver_id).await?;
        if self.deps.blocks.either_blocked(sender.id, receiver.id).await? {
            return Err(GatewayError::Blocked);
        }

        let moderated = self.moderate(&sender, payload.content, payload.kind).await?;
        let message_type = match payload.kind {
            ContentKind::Image => MessageType::Image,
            ContentKind::Text => MessageType::Private,
        };

        let message = self
            .persist(SaveMessage {
                sender_id: sender.id,
                receiver_id: Some(receiver.id),
                room_id: None,
                content: moderated.content,
                message_type,
                is_private: true,
                mentions: Vec::new(),
                is_hidden: moderated.is_hidden,
                hidden_reason: moderated.hidden_reason,
            })
            .await?;

        let dto = self.deps.messages.to_dto(&message, &sender, Some(&receiver));
        let mut out = vec![
            Outbound::topic(Topic::Inbox(receiver.id), ServerEvent::ReceiveMessage(dto.clone())),
            // Other tabs of the sender stay in sync.
            Outbound::filtered(
                Topic::Inbox(sender.id),
                ServerEvent::ReceiveMessage(dto.clone()),
                RecipientFilter {
                    exclude_connection: Some(connection),
                    ..Default::default()
                },
            ),
            Outbound::direct(connection, ServerEvent::ReceiveMessage(dto)),
            delivered(connection, payload.temp_id, &message),
        ];
        out.extend(moderated.notices.into_iter().map(|e| Outbound::direct(connection, e)));
        Ok(out)
    }

    pub(super) async fn send_room(
        &self,
        session: &mut Session,
        payload: RoomMessagePayload,
    ) -> Result<Vec<Outbound>, GatewayError> {
        let sender = Self::identity(session)?.clone();
        let connection = session.connection_id;
        check_payload(&payload, &payload.content)?;

        let room = self.joined_room(session, payload.room_id).await?;
        // Resolved before persisting so a failed lookup cannot leak a message
        // to someone who blocked the sender.
        let blockers = self.blockers_of(sender.id).await?;

        let moderated = self.moderate(&sender, payload.content, payload.kind).await?;
        let mentions = if moderated.is_hidden {
            Vec::new()
        } else {
            self.resolve_mentions(&moderated.content).await
        };
        let message_type = match payload.kind {
            ContentKind::Image => MessageType::Image,
            ContentKind::Text if !mentions.is_empty() => MessageType::Mention,
            ContentKind::Text => MessageType::Public,
        };

        let message = self
            .persist(SaveMessage {
                sender_id: sender.id,
                receiver_id: None,
                room_id: Some(room.id),
                content: moderated.content,
                message_type,
                is_private: false,
                mentions: mentions.clone(),
                is_hidden: moderated.is_hidden,
                hidden_reason: moderated.hidden_reason,
            })
            .await?;

        self.notify_mentions(&sender, &room, mentions);

        let dto = self.deps.messages.to_dto(&message, &sender, None);
        let mut out = vec![
            Outbound::filtered(
                Topic::Room(room.id),
                ServerEvent::ReceivePublicMessage(dto.clone()),
                RecipientFilter {
                    exclude_users: blockers,
                    exclude_connection: Some(connection),
                    ..Default::default()
                },
            ),
            Outbound::direct(connection, ServerEvent::ReceivePublicMessage(dto)),
            delivered(connection, payload.temp_id, &message),
        ];
        out.extend(moderated.notices.into_iter().map(|e| Outbound::direct(connection, e)));
        Ok(out)
    }

    pub(super) async fn send_whisper(
        &self,
        session: &mut Session,
        payload: WhisperPayload,
    ) -> Result<Vec<Outbound>, GatewayError> {
        let sender = Self::identity(session)?.clone();
        let connection = session.connection_id;
        check_payload(&payload, &payload.content)?;

        let room = self.joined_room(session, payload.room_id).await?;
        if payload.receiver_id == sender.id {
            return Err(GatewayError::InvalidPayload("You cannot whisper to yourself".into()));
        }
        let receiver = self.recipient(payload.receiver_id).await?;
        if self.deps.blocks.either_blocked(sender.id, receiver.id).await? {
            return Err(GatewayError::Blocked);
        }

        let moderated = self.moderate(&sender, payload.content, payload.kind).await?;

        let message = self
            .persist(SaveMessage {
                sender_id: sender.id,
                receiver_id: Some(receiver.id),
                room_id: Some(room.id),
                content: moderated.content,
                message_type: MessageType::Whisper,
                is_private: true,
                mentions: Vec::new(),
                is_hidden: moderated.is_hidden,
                hidden_reason: moderated.hidden_reason,
            })
            .await?;

        let dto = self.deps.messages.to_dto(&message, &sender, Some(&receiver));
        let mut out = vec![
            Outbound::filtered(
                Topic::Room(room.id),
                ServerEvent::ReceivePublicMessage(dto.clone()),
                RecipientFilter {
                    only_users: Some(HashSet::from([sender.id, receiver.id])),
                    exclude_connection: Some(connection),
                    ..Default::default()
                },
            ),
            Outbound::direct(connection, ServerEvent::ReceivePublicMessage(dto)),
            delivered(connection, payload.temp_id, &message),
        ];
        out.extend(moderated.notices.into_iter().map(|e| Outbound::direct(connection, e)));
        Ok(out)
    }

    async fn recipient(&self, user_id: Uuid) -> Result<User, GatewayError> {
        self.deps
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| GatewayError::NotFound("Recipient not found".into()))
    }

    /// Guest media, mute, spam, links, profanity.
    async fn moderate(
        &self,
        sender: &User,
        content: String,
        kind: ContentKind,
    ) -> Result<Moderated, GatewayError> {
        let moderation = &self.deps.moderation;

        if sender.is_guest && kind == ContentKind::Image {
            return Err(GatewayError::GuestMedia);
        }

        if moderation.is_muted(sender.id).await {
            return Err(GatewayError::Muted);
        }

        match moderation.check_spam(sender.id, &content).await {
            Ok(true) => {
                let record = self.violation(sender.id, ViolationReason::Spam).await;
                return Err(GatewayError::Spam(record));
            }
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(user_id = %sender.id, error = %e, "Spam check unavailable, allowing");
                metrics::record_persistence_failure("presence");
            }
        }

        if moderation.contains_links_or_socials(&content) {
            let mut notices = vec![ServerEvent::Warning {
                code: "MESSAGE_HIDDEN".to_string(),
                message: "Links and social media handles are not allowed; your message was hidden."
                    .to_string(),
            }];
            if let Some(record) = self.violation(sender.id, ViolationReason::LinkSharing).await {
                notices.push(super::muted_event(&record));
            }
            return Ok(Moderated {
                content: HIDDEN_MESSAGE_PLACEHOLDER.to_string(),
                is_hidden: true,
                hidden_reason: Some(ViolationReason::LinkSharing.as_str().to_string()),
                notices,
            });
        }

        if moderation.contains_profanity(&content) {
            let record = self.violation(sender.id, ViolationReason::Profanity).await;
            return Err(GatewayError::Profanity(record));
        }

        Ok(Moderated {
            content,
            is_hidden: false,
            hidden_reason: None,
            notices: Vec::new(),
        })
    }

    /// Mute for the policy duration. A failed durable write is logged; the
    /// triggering message is still handled per policy.
    async fn violation(&self, user_id: Uuid, reason: ViolationReason) -> Option<MuteRecord> {
        let moderation = &self.deps.moderation;
        let minutes = moderation.mute_minutes_for(reason);
        match moderation.handle_violation(user_id, reason, minutes).await {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::error!(user_id = %user_id, reason = reason.as_str(), error = %e, "Failed to record mute");
                None
            }
        }
    }

    /// Case-insensitive username lookup. Unknown names and lookup failures
    /// are skipped.
    async fn resolve_mentions(&self, content: &str) -> Vec<Uuid> {
        let mut resolved = Vec::new();
        for name in extract_mentions(content) {
            match self.deps.users.find_by_username(&name).await {
                Ok(Some(user)) if !resolved.contains(&user.id) => resolved.push(user.id),
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(username = %name, error = %e, "Mention lookup failed");
                }
            }
        }
        resolved
    }

    /// Persist on a detached task so a closing socket cannot cancel the
    /// write, then kick off scoring.
    async fn persist(&self, request: SaveMessage) -> Result<Message, GatewayError> {
        let messages = Arc::clone(&self.deps.messages);
        let message = tokio::spawn(async move { messages.save(request).await })
            .await
            .map_err(|e| GatewayError::Internal(format!("persist task failed: {}", e)))??;

        metrics::record_message(message.message_type.as_str());
        self.deps
            .scoring
            .spawn_score(message.sender_id, message.message_type);
        Ok(message)
    }

    fn notify_mentions(&self, sender: &User, room: &Room, mentioned: Vec<Uuid>) {
        let targets: Vec<Uuid> = mentioned.into_iter().filter(|id| *id != sender.id).collect();
        if targets.is_empty() {
            return;
        }

        let blocks = Arc::clone(&self.deps.blocks);
        let notifications = Arc::clone(&self.deps.notifications);
        let sender_id = sender.id;
        let title = format!("{} mentioned you", sender.display_name());
        let body = format!("You were mentioned in {}.", room.display_name());

        tokio::spawn(async move {
            for user_id in targets {
                match blocks.is_blocked(user_id, sender_id).await {
                    Ok(false) => {}
                    Ok(true) => continue,
                    Err(e) => {
                        tracing::debug!(user_id = %user_id, error = %e, "Block lookup failed, skipping mention");
                        continue;
                    }
                }
                let notification =
                    Notification::new(user_id, NotificationKind::Mention, title.clone(), body.clone());
                if let Err(e) = notifications.notify(notification).await {
                    tracing::warn!(user_id = %user_id, error = %e, "Failed to send mention notification");
                }
            }
        });
    }
}
