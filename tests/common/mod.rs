//! Common Test Utilities
//!
//! In-memory backends, a wired application state and gateway clients that
//! record what each connection receives.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum_test::TestServer;
use chrono::{DateTime, Utc};
use fake::faker::internet::en::SafeEmail;
use fake::Fake;
use jsonwebtoken::{encode, EncodingKey, Header};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use uuid::Uuid;

use chat_gateway::config::*;
use chat_gateway::domain::*;
use chat_gateway::infrastructure::cache::MemoryPresenceStore;
use chat_gateway::infrastructure::database::DatabaseProbe;
use chat_gateway::presentation::middleware::{Claims, ADMIN_ROLE};
use chat_gateway::presentation::websocket::messages::RoomPayload;
use chat_gateway::presentation::websocket::{ClientEvent, Gateway, ServerEvent, Session};
use chat_gateway::shared::error::AppError;
use chat_gateway::startup::{build_router, AppState, Backends};

pub const JWT_SECRET: &str = "integration-test-jwt-secret-0123456789";
pub const ENCRYPTION_SECRET: &str = "integration-test-encryption-secret-0123";

fn store_down() -> AppError {
    AppError::Database(sqlx::Error::PoolTimedOut)
}

// ---------------------------------------------------------------------------
// Backends
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeUsers {
    users: Mutex<HashMap<Uuid, User>>,
}

impl FakeUsers {
    pub fn insert(&self, user: User) {
        self.users.lock().insert(user.id, user);
    }

    pub fn get(&self, id: Uuid) -> Option<User> {
        self.users.lock().get(&id).cloned()
    }
}

#[async_trait]
impl UserRepository for FakeUsers {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.get(id))
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let wanted = username.to_lowercase();
        Ok(self
            .users
            .lock()
            .values()
            .find(|u| u.username.as_deref().map(str::to_lowercase) == Some(wanted.clone()))
            .cloned())
    }

    async fn find_many(&self, ids: &[Uuid]) -> Result<Vec<User>, AppError> {
        let users = self.users.lock();
        Ok(ids.iter().filter_map(|id| users.get(id).cloned()).collect())
    }

    async fn set_mute(&self, id: Uuid, until: DateTime<Utc>, reason: &str) -> Result<(), AppError> {
        if let Some(user) = self.users.lock().get_mut(&id) {
            user.muted_until = Some(until);
            user.mute_reason = Some(reason.to_string());
        }
        Ok(())
    }

    async fn clear_mute(&self, id: Uuid) -> Result<(), AppError> {
        if let Some(user) = self.users.lock().get_mut(&id) {
            user.muted_until = None;
            user.mute_reason = None;
        }
        Ok(())
    }
}

/// Message table kept in insertion order.
#[derive(Default)]
pub struct FakeMessages {
    rows: Mutex<Vec<Message>>,
    pub fail_writes: AtomicBool,
}

impl FakeMessages {
    pub fn all(&self) -> Vec<Message> {
        self.rows.lock().clone()
    }

    pub fn insert_raw(&self, message: Message) {
        self.rows.lock().push(message);
    }
}

#[async_trait]
impl MessageRepository for FakeMessages {
    async fn create(&self, m: &NewMessage) -> Result<Message, AppError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(store_down());
        }
        let message = Message {
            id: m.id,
            sender_id: m.sender_id,
            receiver_id: m.receiver_id,
            room_id: m.room_id,
            content: m.content.clone(),
            message_type: m.message_type,
            mentions: m.mentions.clone(),
            is_private: m.is_private,
            is_hidden: m.is_hidden,
            hidden_reason: m.hidden_reason.clone(),
            read_at: None,
            created_at: Utc::now(),
        };
        self.rows.lock().push(message.clone());
        Ok(message)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Message>, AppError> {
        Ok(self.rows.lock().iter().find(|m| m.id == id).cloned())
    }

    async fn find_room_history(
        &self,
        room_id: Uuid,
        viewer: Uuid,
        excluded_senders: &[Uuid],
        limit: i64,
    ) -> Result<Vec<Message>, AppError> {
        let mut visible: Vec<Message> = self
            .rows
            .lock()
            .iter()
            .filter(|m| m.room_id == Some(room_id))
            .filter(|m| m.message_type != MessageType::Whisper || m.involves(viewer))
            .filter(|m| !excluded_senders.contains(&m.sender_id))
            .cloned()
            .collect();
        visible.sort_by_key(|m| m.created_at);
        let skip = visible.len().saturating_sub(limit as usize);
        Ok(visible.into_iter().skip(skip).collect())
    }

    async fn find_conversation(
        &self,
        user_a: Uuid,
        user_b: Uuid,
        limit: i64,
    ) -> Result<Vec<Message>, AppError> {
        let mut pair: Vec<Message> = self
            .rows
            .lock()
            .iter()
            .filter(|m| m.room_id.is_none())
            .filter(|m| {
                (m.sender_id == user_a && m.receiver_id == Some(user_b))
                    || (m.sender_id == user_b && m.receiver_id == Some(user_a))
            })
            .cloned()
            .collect();
        pair.sort_by_key(|m| m.created_at);
        let skip = pair.len().saturating_sub(limit as usize);
        Ok(pair.into_iter().skip(skip).collect())
    }

    async fn find_inbox(
        &self,
        user_id: Uuid,
        excluded_partners: &[Uuid],
    ) -> Result<Vec<Message>, AppError> {
        let mut latest: HashMap<Uuid, Message> = HashMap::new();
        for m in self.rows.lock().iter().filter(|m| m.room_id.is_none()) {
            let partner = if m.sender_id == user_id {
                m.receiver_id
            } else if m.receiver_id == Some(user_id) {
                Some(m.sender_id)
            } else {
                None
            };
            if let Some(partner) = partner.filter(|p| !excluded_partners.contains(p)) {
                latest.insert(partner, m.clone());
            }
        }
        let mut rows: Vec<Message> = latest.into_values().collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn mark_read(&self, id: Uuid, reader: Uuid) -> Result<bool, AppError> {
        let mut rows = self.rows.lock();
        match rows
            .iter_mut()
            .find(|m| m.id == id && m.receiver_id == Some(reader) && m.read_at.is_none())
        {
            Some(m) => {
                m.read_at = Some(Utc::now());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError> {
        let mut rows = self.rows.lock();
        let before = rows.len();
        rows.retain(|m| m.created_at >= cutoff);
        Ok((before - rows.len()) as u64)
    }
}

#[derive(Default)]
pub struct FakeRooms {
    rooms: Mutex<HashMap<Uuid, Room>>,
}

impl FakeRooms {
    pub fn get(&self, id: Uuid) -> Option<Room> {
        self.rooms.lock().get(&id).cloned()
    }
}

#[async_trait]
impl RoomRepository for FakeRooms {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Room>, AppError> {
        Ok(self.get(id))
    }

    async fn list_active(&self) -> Result<Vec<Room>, AppError> {
        let mut rooms: Vec<Room> = self
            .rooms
            .lock()
            .values()
            .filter(|r| r.is_open())
            .cloned()
            .collect();
        rooms.sort_by_key(|r| r.created_at);
        Ok(rooms)
    }

    async fn create(&self, room: &NewRoom) -> Result<Room, AppError> {
        let room = Room {
            id: room.id,
            name: room.name.clone(),
            room_type: room.room_type,
            is_active: true,
            is_deleted: false,
            deleted_at: None,
            deleted_by: None,
            created_at: Utc::now(),
        };
        self.rooms.lock().insert(room.id, room.clone());
        Ok(room)
    }

    async fn soft_delete(&self, id: Uuid, actor: Uuid) -> Result<bool, AppError> {
        match self.rooms.lock().get_mut(&id) {
            Some(room) if !room.is_deleted => {
                room.is_deleted = true;
                room.is_active = false;
                room.deleted_at = Some(Utc::now());
                room.deleted_by = Some(actor);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// Directed "blocker blocked blocked" edges.
#[derive(Default)]
pub struct FakeBlocks {
    edges: Mutex<HashSet<(Uuid, Uuid)>>,
}

impl FakeBlocks {
    pub fn block(&self, blocker: Uuid, blocked: Uuid) {
        self.edges.lock().insert((blocker, blocked));
    }
}

#[async_trait]
impl BlockRepository for FakeBlocks {
    async fn is_blocked(&self, blocker: Uuid, blocked: Uuid) -> Result<bool, AppError> {
        Ok(self.edges.lock().contains(&(blocker, blocked)))
    }

    async fn find_blocked(&self, blocker: Uuid) -> Result<Vec<Uuid>, AppError> {
        Ok(self
            .edges
            .lock()
            .iter()
            .filter(|(a, _)| *a == blocker)
            .map(|(_, b)| *b)
            .collect())
    }

    async fn find_blockers(&self, blocked: Uuid) -> Result<Vec<Uuid>, AppError> {
        Ok(self
            .edges
            .lock()
            .iter()
            .filter(|(_, b)| *b == blocked)
            .map(|(a, _)| *a)
            .collect())
    }
}

#[derive(Default)]
pub struct RecordingNotifications {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifications {
    pub fn for_user(&self, user_id: Uuid) -> Vec<Notification> {
        self.sent
            .lock()
            .iter()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl NotificationSink for RecordingNotifications {
    async fn notify(&self, notification: Notification) -> Result<(), AppError> {
        self.sent.lock().push(notification);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingAudit {
    entries: Mutex<Vec<AuditEntry>>,
}

impl RecordingAudit {
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().clone()
    }
}

#[async_trait]
impl AuditLog for RecordingAudit {
    async fn record(&self, entry: AuditEntry) -> Result<(), AppError> {
        self.entries.lock().push(entry);
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeScores {
    totals: Mutex<HashMap<Uuid, i64>>,
    badges: Mutex<HashSet<(Uuid, Badge)>>,
}

impl FakeScores {
    pub fn total(&self, user_id: Uuid) -> i64 {
        self.totals.lock().get(&user_id).copied().unwrap_or(0)
    }
}

#[async_trait]
impl ScoreRepository for FakeScores {
    async fn add_points(&self, user_id: Uuid, points: i64) -> Result<i64, AppError> {
        let mut totals = self.totals.lock();
        let total = totals.entry(user_id).or_insert(0);
        *total += points;
        Ok(*total)
    }

    async fn award_badge(&self, user_id: Uuid, badge: Badge) -> Result<bool, AppError> {
        Ok(self.badges.lock().insert((user_id, badge)))
    }
}

/// Database probe whose health the test controls.
pub struct FakeProbe {
    pub healthy: AtomicBool,
}

#[async_trait]
impl DatabaseProbe for FakeProbe {
    async fn ping(&self) -> Result<(), AppError> {
        if self.healthy.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(store_down())
        }
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub fn test_settings() -> Settings {
    Settings {
        server: ServerSettings {
            host: "127.0.0.1".into(),
            port: 0,
        },
        database: DatabaseSettings {
            url: "postgres://localhost/chat_test".into(),
            max_connections: 1,
            min_connections: 0,
            acquire_timeout: 1,
            run_migrations: false,
        },
        redis: RedisSettings {
            url: "redis://localhost:6379".into(),
        },
        jwt: JwtSettings {
            secret: JWT_SECRET.into(),
        },
        cors: CorsSettings {
            allowed_origins: vec![],
        },
        websocket: WebSocketSettings {
            max_message_size: 65536,
            max_frame_size: 16384,
            heartbeat_interval_ms: 25000,
            heartbeat_grace_ms: 10000,
        },
        presence: PresenceSettings {
            backend: PresenceBackend::Memory,
            online_ttl_secs: 60,
            typing_ttl_secs: 5,
            sweep_interval_secs: 0,
        },
        moderation: ModerationSettings::default(),
        encryption: EncryptionSettings {
            secret: ENCRYPTION_SECRET.into(),
        },
        retention: RetentionSettings {
            message_days: 30,
            sweep_interval_secs: 0,
        },
        scoring: ScoringSettings::default(),
        telemetry: TelemetrySettings { json: false },
        environment: "test".into(),
    }
}

/// Fully wired application over in-memory backends.
pub struct Harness {
    pub settings: Settings,
    pub state: AppState,
    pub presence: Arc<MemoryPresenceStore>,
    pub users: Arc<FakeUsers>,
    pub messages: Arc<FakeMessages>,
    pub rooms: Arc<FakeRooms>,
    pub blocks: Arc<FakeBlocks>,
    pub notifications: Arc<RecordingNotifications>,
    pub audit: Arc<RecordingAudit>,
    pub scores: Arc<FakeScores>,
    pub probe: Arc<FakeProbe>,
}

impl Harness {
    pub fn new() -> Self {
        let settings = test_settings();
        let presence = Arc::new(MemoryPresenceStore::new(60, 5));
        let users = Arc::new(FakeUsers::default());
        let messages = Arc::new(FakeMessages::default());
        let rooms = Arc::new(FakeRooms::default());
        let blocks = Arc::new(FakeBlocks::default());
        let notifications = Arc::new(RecordingNotifications::default());
        let audit = Arc::new(RecordingAudit::default());
        let scores = Arc::new(FakeScores::default());
        let probe = Arc::new(FakeProbe {
            healthy: AtomicBool::new(true),
        });

        let state = AppState::assemble(
            Backends {
                presence: presence.clone(),
                users: users.clone(),
                messages: messages.clone(),
                rooms: rooms.clone(),
                blocks: blocks.clone(),
                notifications: notifications.clone(),
                audit: audit.clone(),
                scores: scores.clone(),
                database: probe.clone(),
            },
            &settings,
        );

        Self {
            settings,
            state,
            presence,
            users,
            messages,
            rooms,
            blocks,
            notifications,
            audit,
            scores,
            probe,
        }
    }

    pub fn gateway(&self) -> &Gateway {
        &self.state.gateway
    }

    pub fn server(&self) -> TestServer {
        TestServer::new(build_router(self.state.clone(), &self.settings))
            .expect("test server starts")
    }

    fn make_user(&self, username: &str, is_guest: bool) -> User {
        let user = User {
            id: Uuid::new_v4(),
            username: Some(username.to_string()),
            email: SafeEmail().fake(),
            avatar_url: None,
            is_guest,
            muted_until: None,
            mute_reason: None,
            created_at: Utc::now(),
        };
        self.users.insert(user.clone());
        user
    }

    pub fn add_user(&self, username: &str) -> User {
        self.make_user(username, false)
    }

    pub fn add_guest(&self, username: &str) -> User {
        self.make_user(username, true)
    }

    pub async fn add_room(&self, name: &str) -> Room {
        self.rooms
            .create(&NewRoom {
                id: Uuid::new_v4(),
                name: Some(name.to_string()),
                room_type: RoomType::Public,
            })
            .await
            .expect("room created")
    }

    pub fn block(&self, blocker: &User, blocked: &User) {
        self.blocks.block(blocker.id, blocked.id);
    }

    pub fn token(&self, user_id: Uuid) -> String {
        self.token_with_role(user_id, None)
    }

    /// Token carrying the room administration role.
    pub fn admin_token(&self, user_id: Uuid) -> String {
        self.token_with_role(user_id, Some(ADMIN_ROLE))
    }

    fn token_with_role(&self, user_id: Uuid, role: Option<&str>) -> String {
        let now = Utc::now().timestamp();
        encode(
            &Header::default(),
            &Claims {
                sub: user_id.to_string(),
                exp: now + 3600,
                iat: now,
                role: role.map(str::to_string),
            },
            &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
        )
        .expect("token encodes")
    }

    /// Open a gateway connection, authenticated when a user is given.
    pub async fn connect(&self, user: Option<&User>) -> Client {
        let token = user.map(|u| self.token(u.id));
        self.connect_with_token(token.as_deref()).await
    }

    pub async fn connect_with_token(&self, token: Option<&str>) -> Client {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = self.gateway().connect(token, tx).await;
        Client { session, rx }
    }

    /// Connect and join a room, discarding the bootstrap events.
    pub async fn joined(&self, user: &User, room: &Room) -> Client {
        let mut client = self.connect(Some(user)).await;
        client
            .send(self, ClientEvent::JoinPublic(RoomPayload { room_id: room.id }))
            .await;
        client
    }
}

/// One gateway connection and everything delivered to it.
pub struct Client {
    pub session: Session,
    pub rx: mpsc::UnboundedReceiver<ServerEvent>,
}

impl Client {
    /// Events queued so far.
    pub fn drain(&mut self) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }

    /// Dispatch an event and return what this connection received.
    pub async fn send(&mut self, harness: &Harness, event: ClientEvent) -> Vec<ServerEvent> {
        harness.gateway().dispatch(&mut self.session, event).await;
        self.drain()
    }

    /// Dispatch a raw JSON frame the way the socket loop would.
    pub async fn send_json(&mut self, harness: &Harness, frame: serde_json::Value) -> Vec<ServerEvent> {
        let event: ClientEvent = serde_json::from_value(frame).expect("valid client event");
        self.send(harness, event).await
    }

    pub async fn disconnect(self, harness: &Harness) {
        harness.gateway().disconnect(self.session).await;
    }
}

/// Let spawned side-effect tasks run.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}

/// Names of the events, in order.
pub fn names(events: &[ServerEvent]) -> Vec<&'static str> {
    events.iter().map(ServerEvent::name).collect()
}

pub fn count(events: &[ServerEvent], name: &str) -> usize {
    events.iter().filter(|e| e.name() == name).count()
}
