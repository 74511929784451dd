//! Application Startup
//!
//! Application building and server initialization.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower::ServiceBuilder;

use crate::application::services::{MessageService, ModerationService, RoomService, ScoringService};
use crate::config::{PresenceBackend, Settings, WebSocketSettings};
use crate::domain::{
    AuditLog, BlockRepository, MessageRepository, NotificationSink, RoomRepository,
    ScoreRepository, UserRepository,
};
use crate::infrastructure::cache::{self, MemoryPresenceStore, PresenceStore, RedisPresenceStore};
use crate::infrastructure::crypto::ContentCipher;
use crate::infrastructure::database::{self, DatabaseProbe};
use crate::infrastructure::repositories::{
    PgAuditLog, PgBlockRepository, PgMessageRepository, PgNotificationSink, PgRoomRepository,
    PgScoreRepository, PgUserRepository,
};
use crate::presentation::http::{handlers, routes};
use crate::presentation::middleware::{cors, logging, TokenVerifier};
use crate::presentation::websocket::{Gateway, GatewayDeps};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<Gateway>,
    pub rooms: Arc<RoomService>,
    pub messages: Arc<MessageService>,
    pub presence: Arc<dyn PresenceStore>,
    pub database: Arc<dyn DatabaseProbe>,
    pub tokens: TokenVerifier,
    pub websocket: Arc<WebSocketSettings>,
}

/// Storage capabilities the services are built on.
pub struct Backends {
    pub presence: Arc<dyn PresenceStore>,
    pub users: Arc<dyn UserRepository>,
    pub messages: Arc<dyn MessageRepository>,
    pub rooms: Arc<dyn RoomRepository>,
    pub blocks: Arc<dyn BlockRepository>,
    pub notifications: Arc<dyn NotificationSink>,
    pub audit: Arc<dyn AuditLog>,
    pub scores: Arc<dyn ScoreRepository>,
    pub database: Arc<dyn DatabaseProbe>,
}

impl AppState {
    /// Wire services and the gateway on top of the given backends.
    pub fn assemble(backends: Backends, settings: &Settings) -> Self {
        let cipher = ContentCipher::new(&settings.encryption.secret);
        let tokens = TokenVerifier::new(&settings.jwt.secret);

        let rooms = Arc::new(RoomService::new(backends.rooms.clone()));
        let messages = Arc::new(MessageService::new(
            backends.messages.clone(),
            backends.users.clone(),
            backends.blocks.clone(),
            cipher,
        ));
        let moderation = Arc::new(ModerationService::new(
            backends.presence.clone(),
            backends.users.clone(),
            backends.notifications.clone(),
            backends.audit.clone(),
            settings.moderation.clone(),
        ));
        let scoring = Arc::new(ScoringService::new(
            backends.scores.clone(),
            backends.notifications.clone(),
            settings.scoring.clone(),
        ));

        let gateway = Arc::new(Gateway::new(GatewayDeps {
            presence: backends.presence.clone(),
            users: backends.users.clone(),
            blocks: backends.blocks.clone(),
            notifications: backends.notifications.clone(),
            rooms: rooms.clone(),
            messages: messages.clone(),
            moderation,
            scoring,
            tokens: tokens.clone(),
            heartbeat_interval: Duration::from_millis(settings.websocket.heartbeat_interval_ms),
            heartbeat_grace: Duration::from_millis(settings.websocket.heartbeat_grace_ms),
        }));

        Self {
            gateway,
            rooms,
            messages,
            presence: backends.presence,
            database: backends.database,
            tokens,
            websocket: Arc::new(settings.websocket.clone()),
        }
    }
}

/// Build the full router with tracing and CORS.
pub fn build_router(state: AppState, settings: &Settings) -> Router {
    routes::create_router(state).layer(
        ServiceBuilder::new()
            .layer(logging::create_trace_layer())
            .layer(cors::create_cors_layer(&settings.cors)),
    )
}

/// Application instance
pub struct Application {
    listener: TcpListener,
    router: Router,
    maintenance: JoinHandle<()>,
}

impl Application {
    /// Build the application from settings
    pub async fn build(settings: Settings) -> Result<Self> {
        handlers::health::init_server_start();

        // Create database pool
        let db = database::create_pool(&settings.database).await?;
        tracing::info!("Database connection pool created");

        if settings.database.run_migrations {
            database::run_migrations(&db).await?;
            tracing::info!("Database migrations applied");
        }

        let memory_presence = match settings.presence.backend {
            PresenceBackend::Memory => Some(Arc::new(MemoryPresenceStore::new(
                settings.presence.online_ttl_secs,
                settings.presence.typing_ttl_secs,
            ))),
            PresenceBackend::Redis => None,
        };
        let presence: Arc<dyn PresenceStore> = match &memory_presence {
            Some(store) => {
                tracing::info!("Using in-process presence store");
                store.clone()
            }
            None => {
                let redis = cache::create_redis_client(&settings.redis).await?;
                tracing::info!("Redis connection established");
                Arc::new(RedisPresenceStore::new(
                    redis,
                    settings.presence.online_ttl_secs,
                    settings.presence.typing_ttl_secs,
                ))
            }
        };

        let backends = Backends {
            presence,
            users: Arc::new(PgUserRepository::new(db.clone())),
            messages: Arc::new(PgMessageRepository::new(db.clone())),
            rooms: Arc::new(PgRoomRepository::new(db.clone())),
            blocks: Arc::new(PgBlockRepository::new(db.clone())),
            notifications: Arc::new(PgNotificationSink::new(db.clone())),
            audit: Arc::new(PgAuditLog::new(db.clone())),
            scores: Arc::new(PgScoreRepository::new(db.clone())),
            database: Arc::new(db),
        };

        let state = AppState::assemble(backends, &settings);
        let maintenance = spawn_maintenance(
            state.messages.clone(),
            memory_presence,
            settings.retention.message_days,
            Duration::from_secs(settings.retention.sweep_interval_secs),
            Duration::from_secs(settings.presence.sweep_interval_secs),
        );

        let router = build_router(state, &settings);

        // Bind to address
        let listener = TcpListener::bind(settings.server_addr()).await?;
        tracing::info!("Listening on {}", listener.local_addr()?);

        Ok(Self {
            listener,
            router,
            maintenance,
        })
    }

    /// Run the server until stopped
    pub async fn run_until_stopped(self) -> Result<()> {
        let result = axum::serve(self.listener, self.router).await;
        self.maintenance.abort();
        result?;
        Ok(())
    }

    /// Get the bound address
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

/// Periodic retention purge plus, for the in-process presence store, the
/// expired-entry sweep. A zero interval disables that job.
fn spawn_maintenance(
    messages: Arc<MessageService>,
    memory_presence: Option<Arc<MemoryPresenceStore>>,
    retention_days: i64,
    retention_every: Duration,
    sweep_every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut retention = (!retention_every.is_zero()).then(|| tokio::time::interval(retention_every));
        let mut sweep = match &memory_presence {
            Some(_) if !sweep_every.is_zero() => Some(tokio::time::interval(sweep_every)),
            _ => None,
        };

        if retention.is_none() && sweep.is_none() {
            return;
        }

        loop {
            tokio::select! {
                _ = tick(&mut retention) => {
                    if let Err(e) = messages.purge_older_than(retention_days).await {
                        tracing::warn!(error = %e, "Retention sweep failed");
                    }
                }
                _ = tick(&mut sweep) => {
                    if let Some(store) = &memory_presence {
                        let evicted = store.sweep();
                        if evicted > 0 {
                            tracing::debug!(evicted, "Swept expired presence entries");
                        }
                    }
                }
            }
        }
    })
}

/// Tick an optional interval; a disabled one never fires.
async fn tick(interval: &mut Option<tokio::time::Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
