//! WebSocket Gateway
//!
//! Dispatches inbound events for every connection and routes the resulting
//! outbound events through the connection registry.
//!
//! Handlers never write to sockets. Each one returns a list of [`Outbound`]
//! deliveries which [`Gateway::deliver`] then fans out, applying the
//! per-recipient filters carried by each delivery.

mod pipeline;

use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::FutureExt;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::messages::{ClientEvent, ErrorCode, ServerEvent, TypingPayload};
use super::registry::{ConnectionRegistry, Topic};
use super::session::{ConnectionId, Session};
use crate::application::dto::{MessageDto, MessageParty, RosterEntry, SYSTEM_PARTICIPANT_ID, SYSTEM_PARTICIPANT_NAME};
use crate::application::services::{
    MessageService, ModerationService, MuteRecord, RoomService, ScoringService,
};
use crate::domain::{BlockRepository, MessageType, NotificationSink, Room, User, UserRepository};
use crate::infrastructure::cache::PresenceStore;
use crate::infrastructure::metrics;
use crate::presentation::middleware::auth::TokenVerifier;
use crate::shared::error::AppError;

/// Why a gateway action was refused.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Authentication required")]
    Unauthenticated,

    #[error("{0}")]
    Forbidden(String),

    #[error("You cannot message this user")]
    Blocked,

    #[error("You are muted")]
    Muted,

    #[error("Guests cannot send images")]
    GuestMedia,

    #[error("Spam detected, you have been muted")]
    Spam(Option<MuteRecord>),

    #[error("Message contains inappropriate language")]
    Profanity(Option<MuteRecord>),

    #[error("Room not found")]
    RoomNotFound,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidPayload(String),

    #[error(transparent)]
    Store(AppError),

    #[error("{0}")]
    Internal(String),
}

impl GatewayError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Unauthenticated => ErrorCode::Unauthenticated,
            Self::Forbidden(_) => ErrorCode::Forbidden,
            Self::Blocked => ErrorCode::Blocked,
            Self::Muted => ErrorCode::Muted,
            Self::GuestMedia => ErrorCode::GuestMediaRestricted,
            Self::Spam(_) => ErrorCode::SpamDetected,
            Self::Profanity(_) => ErrorCode::ProfanityDetected,
            Self::RoomNotFound => ErrorCode::RoomNotFound,
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::InvalidPayload(_) => ErrorCode::InvalidPayload,
            Self::Store(_) | Self::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Message shown to the client. Store and internal details stay in the logs.
    pub fn client_message(&self) -> String {
        match self {
            Self::Store(_) | Self::Internal(_) => "Something went wrong, please retry".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<AppError> for GatewayError {
    fn from(err: AppError) -> Self {
        match err {
            e if e.is_store_failure() => Self::Store(e),
            AppError::NotFound(msg) => Self::NotFound(msg),
            AppError::BadRequest(msg) | AppError::Validation(msg) => Self::InvalidPayload(msg),
            AppError::Unauthorized(_) => Self::Unauthenticated,
            AppError::Forbidden(msg) => Self::Forbidden(msg),
            other => Self::Internal(other.to_string()),
        }
    }
}

/// Which subscribers of a topic receive a delivery.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecipientFilter {
    /// Identities that blocked the actor
    pub exclude_users: HashSet<Uuid>,
    /// When set, only these identities receive the event
    pub only_users: Option<HashSet<Uuid>>,
    pub exclude_connection: Option<ConnectionId>,
}

/// One delivery produced by a handler.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Direct {
        connection: ConnectionId,
        event: ServerEvent,
    },
    Topic {
        topic: Topic,
        event: ServerEvent,
        filter: RecipientFilter,
    },
}

impl Outbound {
    pub fn direct(connection: ConnectionId, event: ServerEvent) -> Self {
        Self::Direct { connection, event }
    }

    pub fn topic(topic: Topic, event: ServerEvent) -> Self {
        Self::Topic {
            topic,
            event,
            filter: RecipientFilter::default(),
        }
    }

    pub fn filtered(topic: Topic, event: ServerEvent, filter: RecipientFilter) -> Self {
        Self::Topic { topic, event, filter }
    }
}

/// Everything the gateway talks to.
pub struct GatewayDeps {
    pub presence: Arc<dyn PresenceStore>,
    pub users: Arc<dyn UserRepository>,
    pub blocks: Arc<dyn BlockRepository>,
    pub notifications: Arc<dyn NotificationSink>,
    pub rooms: Arc<RoomService>,
    pub messages: Arc<MessageService>,
    pub moderation: Arc<ModerationService>,
    pub scoring: Arc<ScoringService>,
    pub tokens: TokenVerifier,
    pub heartbeat_interval: Duration,
    pub heartbeat_grace: Duration,
}

/// Gateway state shared by every connection task.
pub struct Gateway {
    deps: GatewayDeps,
    registry: ConnectionRegistry,
}

impl Gateway {
    pub fn new(deps: GatewayDeps) -> Self {
        Self {
            deps,
            registry: ConnectionRegistry::new(),
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Interval clients are expected to heartbeat at
    pub fn heartbeat_interval(&self) -> Duration {
        self.deps.heartbeat_interval
    }

    /// Silence after which a connection is closed.
    pub fn heartbeat_timeout(&self) -> Duration {
        self.deps.heartbeat_interval + self.deps.heartbeat_grace
    }

    /// Register a new connection. A missing or invalid credential leaves the
    /// connection anonymous; it is never refused.
    pub async fn connect(
        &self,
        token: Option<&str>,
        sender: mpsc::UnboundedSender<ServerEvent>,
    ) -> Session {
        let connection_id = Uuid::new_v4();
        self.registry.register(connection_id, sender);

        let user = match token {
            Some(token) => self.authenticate(token).await,
            None => None,
        };

        if let Some(user) = &user {
            self.registry.identify(connection_id, user.id);
            if let Err(e) = self.deps.presence.set_online(user.id).await {
                tracing::warn!(user_id = %user.id, error = %e, "Failed to mark user online");
                metrics::record_persistence_failure("presence");
            }
            tracing::info!(connection_id = %connection_id, user_id = %user.id, "Connection identified");
        } else {
            tracing::debug!(connection_id = %connection_id, "Anonymous connection");
        }

        self.registry.send(
            connection_id,
            ServerEvent::Ready {
                user: user.as_ref().map(MessageParty::from),
            },
        );
        self.update_gauge();

        Session::new(connection_id, user)
    }

    async fn authenticate(&self, token: &str) -> Option<User> {
        let user_id = match self.deps.tokens.verify(token) {
            Ok(id) => id,
            Err(e) => {
                tracing::debug!(error = %e, "Rejected connection credential");
                return None;
            }
        };

        match self.deps.users.find_by_id(user_id).await {
            Ok(Some(user)) => Some(user),
            Ok(None) => {
                tracing::debug!(user_id = %user_id, "Credential for unknown user");
                None
            }
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "Identity lookup failed");
                None
            }
        }
    }

    /// Handle one inbound event and deliver the results. Never panics and
    /// never fails: every error becomes an event for the caller.
    pub async fn dispatch(&self, session: &mut Session, event: ClientEvent) {
        let name = event.name();
        let temp_id = event.temp_id().map(str::to_owned);
        let is_send = matches!(
            event,
            ClientEvent::SendMessage(_)
                | ClientEvent::SendPublicMessage(_)
                | ClientEvent::SendWhisper(_)
        );
        let connection_id = session.connection_id;
        // Any inbound event proves the client is alive.
        session.heartbeat();

        let outcome = AssertUnwindSafe(self.handle(session, event))
            .catch_unwind()
            .await;

        let outbound = match outcome {
            Ok(Ok(outbound)) => outbound,
            Ok(Err(err)) => {
                self.failure_events(connection_id, name, is_send, temp_id, err)
            }
            Err(_) => {
                tracing::error!(connection_id = %connection_id, event = name, "Event handler panicked");
                self.failure_events(
                    connection_id,
                    name,
                    is_send,
                    temp_id,
                    GatewayError::Internal("handler panicked".into()),
                )
            }
        };

        self.deliver(outbound);
    }

    fn failure_events(
        &self,
        connection_id: ConnectionId,
        name: &'static str,
        is_send: bool,
        temp_id: Option<String>,
        err: GatewayError,
    ) -> Vec<Outbound> {
        match &err {
            GatewayError::Store(e) => {
                tracing::error!(connection_id = %connection_id, event = name, error = %e, "Store failure");
                metrics::record_persistence_failure("message_store");
            }
            GatewayError::Internal(msg) => {
                tracing::error!(connection_id = %connection_id, event = name, error = %msg, "Internal failure");
            }
            other => {
                tracing::debug!(connection_id = %connection_id, event = name, reason = %other, "Event rejected");
            }
        }

        let mut out = Vec::new();
        if is_send {
            out.push(Outbound::direct(
                connection_id,
                ServerEvent::DeliveryFailed {
                    temp_id,
                    reason: err.client_message(),
                },
            ));
        }

        // Persistence failures on a send are reported by delivery_failed alone.
        if !(is_send && matches!(err, GatewayError::Store(_))) {
            out.push(Outbound::direct(
                connection_id,
                ServerEvent::error(err.code(), err.client_message()),
            ));
        }

        if let GatewayError::Spam(Some(record)) | GatewayError::Profanity(Some(record)) = &err {
            out.push(Outbound::direct(connection_id, muted_event(record)));
        }
        out
    }

    /// Pure-ish event handler: reads and writes stores, returns deliveries.
    pub async fn handle(
        &self,
        session: &mut Session,
        event: ClientEvent,
    ) -> Result<Vec<Outbound>, GatewayError> {
        match event {
            ClientEvent::Join(payload) => self.join_inbox(session, payload.room),
            ClientEvent::JoinPublic(payload) => self.join_public(session, payload.room_id).await,
            ClientEvent::LeavePublic(payload) => self.leave_public(session, payload.room_id).await,
            ClientEvent::SendMessage(payload) => self.send_private(session, payload).await,
            ClientEvent::SendPublicMessage(payload) => self.send_room(session, payload).await,
            ClientEvent::SendWhisper(payload) => self.send_whisper(session, payload).await,
            ClientEvent::ReadReceipt(payload) => self.read_receipt(session, payload.message_id).await,
            ClientEvent::Typing(payload) => self.typing(session, payload).await,
            ClientEvent::Heartbeat => Ok(self.heartbeat(session).await),
        }
    }

    /// Fan deliveries out to live connections.
    pub fn deliver(&self, outbound: Vec<Outbound>) {
        for item in outbound {
            match item {
                Outbound::Direct { connection, event } => {
                    if !self.registry.send(connection, event) {
                        tracing::trace!(connection_id = %connection, "Dropped event for closed connection");
                    }
                }
                Outbound::Topic { topic, event, filter } => {
                    for (connection, user_id) in self.registry.subscribers(topic) {
                        if filter.exclude_connection == Some(connection) {
                            continue;
                        }
                        if let Some(only) = &filter.only_users {
                            if !user_id.is_some_and(|id| only.contains(&id)) {
                                continue;
                            }
                        }
                        if user_id.is_some_and(|id| filter.exclude_users.contains(&id)) {
                            metrics::record_blocked_delivery();
                            continue;
                        }
                        self.registry.send(connection, event.clone());
                    }
                }
            }
        }
    }

    fn identity(session: &Session) -> Result<&User, GatewayError> {
        session.user.as_ref().ok_or(GatewayError::Unauthenticated)
    }

    fn join_inbox(&self, session: &mut Session, room: Uuid) -> Result<Vec<Outbound>, GatewayError> {
        let user_id = Self::identity(session)?.id;
        if room != user_id {
            return Err(GatewayError::Forbidden(
                "You can only join your own inbox".into(),
            ));
        }

        if session.inbox_joined {
            return Ok(Vec::new());
        }
        self.registry.subscribe(session.connection_id, Topic::Inbox(user_id));
        session.inbox_joined = true;
        tracing::debug!(connection_id = %session.connection_id, "Joined inbox");
        Ok(Vec::new())
    }

    async fn join_public(
        &self,
        session: &mut Session,
        room_id: Uuid,
    ) -> Result<Vec<Outbound>, GatewayError> {
        let user = Self::identity(session)?.clone();
        let room = self.active_room(room_id).await?;

        self.deps.presence.add_room_member(room_id, user.id).await?;
        self.registry.subscribe(session.connection_id, Topic::Room(room_id));
        session.joined_rooms.insert(room_id);

        let mut out = Vec::new();
        if session.welcomed_rooms.insert(room_id) {
            let blockers = self.blockers_of(user.id).await?;
            out.push(Outbound::filtered(
                Topic::Room(room_id),
                ServerEvent::ReceivePublicMessage(system_message(
                    &room,
                    MessageType::Join,
                    format!("{} joined {}", user.display_name(), room.display_name()),
                )),
                RecipientFilter {
                    exclude_users: blockers,
                    ..Default::default()
                },
            ));
            out.push(Outbound::direct(
                session.connection_id,
                ServerEvent::ReceivePublicMessage(system_message(
                    &room,
                    MessageType::Welcome,
                    format!("Welcome to {}, {}!", room.display_name(), user.display_name()),
                )),
            ));
            tracing::info!(user_id = %user.id, room_id = %room_id, "Joined room");
        }

        out.push(self.roster_update(room_id).await?);
        Ok(out)
    }

    async fn leave_public(
        &self,
        session: &mut Session,
        room_id: Uuid,
    ) -> Result<Vec<Outbound>, GatewayError> {
        let user_id = Self::identity(session)?.id;

        self.registry.unsubscribe(session.connection_id, Topic::Room(room_id));
        session.joined_rooms.remove(&room_id);

        let mut out = Vec::new();
        if !self
            .registry
            .user_subscribed(user_id, Topic::Room(room_id), session.connection_id)
        {
            self.deps.presence.remove_room_member(room_id, user_id).await?;
            if let Some(user) = session.user.as_ref() {
                out.extend(self.stop_typing(user, room_id).await);
            }
        }

        tracing::debug!(user_id = %user_id, room_id = %room_id, "Left room");
        out.push(self.roster_update(room_id).await?);
        Ok(out)
    }

    async fn read_receipt(
        &self,
        session: &mut Session,
        message_id: Uuid,
    ) -> Result<Vec<Outbound>, GatewayError> {
        let reader = Self::identity(session)?.id;

        let Some(message) = self.deps.messages.mark_read(message_id, reader).await? else {
            return Ok(Vec::new());
        };

        if self.deps.blocks.is_blocked(message.sender_id, reader).await? {
            return Ok(Vec::new());
        }

        Ok(vec![Outbound::topic(
            Topic::Inbox(message.sender_id),
            ServerEvent::MessageRead {
                message_id,
                reader_id: reader,
                read_at: message.read_at.unwrap_or_else(Utc::now),
            },
        )])
    }

    async fn typing(
        &self,
        session: &mut Session,
        payload: TypingPayload,
    ) -> Result<Vec<Outbound>, GatewayError> {
        let user = Self::identity(session)?;
        let user_id = user.id;

        let topic = match (payload.room_id, payload.receiver_id) {
            (Some(room_id), None) => {
                self.joined_room(session, room_id).await?;
                // Markers are room scoped; direct typing is relay only.
                let stored = if payload.is_typing {
                    self.deps.presence.set_typing(user_id, room_id).await
                } else {
                    self.deps.presence.clear_typing(user_id, room_id).await
                };
                if let Err(e) = stored {
                    tracing::debug!(user_id = %user_id, error = %e, "Failed to store typing marker");
                }
                Topic::Room(room_id)
            }
            (None, Some(receiver_id)) => Topic::Inbox(receiver_id),
            _ => {
                return Err(GatewayError::InvalidPayload(
                    "typing needs exactly one of room_id or receiver_id".into(),
                ))
            }
        };

        let blockers = self.blockers_of(user_id).await?;
        Ok(vec![Outbound::filtered(
            topic,
            ServerEvent::UserTyping {
                user_id,
                display_name: user.display_name(),
                room_id: payload.room_id,
                is_typing: payload.is_typing,
            },
            RecipientFilter {
                exclude_users: blockers,
                exclude_connection: Some(session.connection_id),
                ..Default::default()
            },
        )])
    }

    async fn heartbeat(&self, session: &mut Session) -> Vec<Outbound> {
        session.heartbeat();
        if let Some(user_id) = session.user_id() {
            if let Err(e) = self.deps.presence.set_online(user_id).await {
                tracing::debug!(user_id = %user_id, error = %e, "Failed to refresh presence");
            }
        }
        vec![Outbound::direct(
            session.connection_id,
            ServerEvent::HeartbeatAck { timestamp: Utc::now() },
        )]
    }

    /// Tear a connection down. Every room the identity belonged to is left
    /// and its roster rebroadcast once; a failing room does not stop the
    /// others. Safe to call for a connection that is already gone.
    pub async fn disconnect(&self, session: Session) {
        let connection_id = session.connection_id;
        self.registry.unregister(connection_id);

        let Some(user_id) = session.user_id() else {
            self.update_gauge();
            tracing::debug!(connection_id = %connection_id, "Anonymous connection closed");
            return;
        };

        let mut rooms = session.joined_rooms.clone();
        match self.deps.presence.user_rooms(user_id).await {
            Ok(indexed) => rooms.extend(indexed),
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "Failed to read room index on disconnect");
            }
        }

        for room_id in rooms {
            // Another live connection of this user keeps the membership.
            if self
                .registry
                .user_subscribed(user_id, Topic::Room(room_id), connection_id)
            {
                continue;
            }

            if let Err(e) = self.deps.presence.remove_room_member(room_id, user_id).await {
                tracing::warn!(user_id = %user_id, room_id = %room_id, error = %e, "Failed to remove room member");
                continue;
            }
            if let Some(user) = session.user.as_ref() {
                if let Some(stopped) = self.stop_typing(user, room_id).await {
                    self.deliver(vec![stopped]);
                }
            }
            match self.roster_update(room_id).await {
                Ok(update) => self.deliver(vec![update]),
                Err(e) => {
                    tracing::warn!(room_id = %room_id, error = %e, "Failed to rebroadcast roster");
                }
            }
        }

        if !self.registry.is_user_online(user_id) {
            if let Err(e) = self.deps.presence.clear_user_rooms(user_id).await {
                tracing::warn!(user_id = %user_id, error = %e, "Failed to clear room index");
            }
            if let Err(e) = self.deps.presence.set_offline(user_id).await {
                tracing::warn!(user_id = %user_id, error = %e, "Failed to mark user offline");
            }
        }

        self.update_gauge();
        tracing::info!(connection_id = %connection_id, user_id = %user_id, "Connection closed");
    }

    /// Evict every live connection from a deleted room and drop its
    /// membership. Returns how many connections were evicted.
    pub async fn close_room(&self, room_id: Uuid) -> Result<usize, AppError> {
        let evicted = self.registry.close_topic(Topic::Room(room_id));
        for connection in &evicted {
            self.registry
                .send(*connection, ServerEvent::RoomClosed { room_id });
        }
        self.deps.presence.clear_room(room_id).await?;

        tracing::info!(room_id = %room_id, evicted = evicted.len(), "Room closed");
        Ok(evicted.len())
    }

    /// Current roster of a room, system participant first.
    pub async fn room_roster(&self, room_id: Uuid) -> Result<Vec<RosterEntry>, AppError> {
        let members: Vec<Uuid> = self
            .deps
            .presence
            .room_members(room_id)
            .await?
            .into_iter()
            .collect();

        let mut users = self.deps.users.find_many(&members).await?;
        users.sort_by_key(|u| u.display_name().to_lowercase());

        let mut roster = Vec::with_capacity(users.len() + 1);
        roster.push(RosterEntry::system());
        roster.extend(users.iter().map(RosterEntry::from));
        Ok(roster)
    }

    /// Clear a live typing marker and tell the room the user stopped.
    async fn stop_typing(&self, user: &User, room_id: Uuid) -> Option<Outbound> {
        let presence = &self.deps.presence;
        match presence.is_typing(user.id, room_id).await {
            Ok(true) => {}
            Ok(false) => return None,
            Err(e) => {
                tracing::debug!(user_id = %user.id, error = %e, "Failed to read typing marker");
                return None;
            }
        }
        if let Err(e) = presence.clear_typing(user.id, room_id).await {
            tracing::debug!(user_id = %user.id, error = %e, "Failed to clear typing marker");
        }
        Some(Outbound::topic(
            Topic::Room(room_id),
            ServerEvent::UserTyping {
                user_id: user.id,
                display_name: user.display_name(),
                room_id: Some(room_id),
                is_typing: false,
            },
        ))
    }

    async fn roster_update(&self, room_id: Uuid) -> Result<Outbound, GatewayError> {
        let users = self.room_roster(room_id).await?;
        Ok(Outbound::topic(
            Topic::Room(room_id),
            ServerEvent::ActiveUsersUpdate { room_id, users },
        ))
    }

    async fn active_room(&self, room_id: Uuid) -> Result<Room, GatewayError> {
        match self.deps.rooms.get_active(room_id).await {
            Ok(room) => Ok(room),
            Err(AppError::NotFound(_)) => Err(GatewayError::RoomNotFound),
            Err(e) => Err(e.into()),
        }
    }

    /// Active room this connection is subscribed to.
    async fn joined_room(&self, session: &Session, room_id: Uuid) -> Result<Room, GatewayError> {
        let room = self.active_room(room_id).await?;
        if !session.joined_rooms.contains(&room_id) {
            return Err(GatewayError::Forbidden("Join the room first".into()));
        }
        Ok(room)
    }

    async fn blockers_of(&self, user_id: Uuid) -> Result<HashSet<Uuid>, GatewayError> {
        Ok(self
            .deps
            .blocks
            .find_blockers(user_id)
            .await?
            .into_iter()
            .collect())
    }

    fn update_gauge(&self) {
        metrics::set_gateway_connections(
            self.registry.connection_count(),
            self.registry.identified_count(),
        );
    }
}

fn muted_event(record: &MuteRecord) -> ServerEvent {
    ServerEvent::UserMuted {
        reason: record.reason,
        muted_until: record.muted_until,
        duration_minutes: record.duration_minutes,
    }
}

/// Ephemeral JOIN / WELCOME message authored by the system participant.
fn system_message(room: &Room, kind: MessageType, content: String) -> MessageDto {
    MessageDto {
        id: Uuid::now_v7(),
        room_id: Some(room.id),
        sender: MessageParty {
            id: SYSTEM_PARTICIPANT_ID,
            display_name: SYSTEM_PARTICIPANT_NAME.to_string(),
            avatar_url: None,
        },
        receiver: None,
        content,
        message_type: kind.as_str().to_string(),
        mentions: Vec::new(),
        is_private: false,
        is_hidden: false,
        hidden_reason: None,
        read_at: None,
        created_at: Utc::now(),
    }
}
