//! Application settings and configuration structures.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Root configuration structure containing all application settings.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Server configuration (host, port)
    pub server: ServerSettings,

    /// Database configuration (PostgreSQL)
    pub database: DatabaseSettings,

    /// Redis configuration
    pub redis: RedisSettings,

    /// JWT verification settings
    pub jwt: JwtSettings,

    /// CORS configuration
    pub cors: CorsSettings,

    /// WebSocket configuration
    pub websocket: WebSocketSettings,

    /// Presence store backend and TTLs
    pub presence: PresenceSettings,

    /// Moderation thresholds and blocklist
    pub moderation: ModerationSettings,

    /// At-rest message encryption
    pub encryption: EncryptionSettings,

    /// Message retention sweep
    pub retention: RetentionSettings,

    /// Gamification point table
    pub scoring: ScoringSettings,

    /// Log output format
    pub telemetry: TelemetrySettings,

    /// Current environment (development, staging, production)
    pub environment: String,
}

/// Server binding configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// Host address to bind to (e.g., "0.0.0.0")
    pub host: String,

    /// Port number to listen on
    pub port: u16,
}

/// PostgreSQL database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// Database connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections to maintain
    pub min_connections: u32,

    /// Connection acquire timeout in seconds
    pub acquire_timeout: u64,

    /// Apply embedded migrations on startup
    pub run_migrations: bool,
}

/// Redis configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisSettings {
    /// Redis connection URL
    pub url: String,
}

/// JWT verification configuration.
///
/// Tokens are issued by the external identity service; the gateway only
/// verifies them.
#[derive(Debug, Clone, Deserialize)]
pub struct JwtSettings {
    /// Shared secret used to verify HS256 signatures
    pub secret: String,
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CorsSettings {
    /// Allowed origins (comma-separated in env)
    pub allowed_origins: Vec<String>,
}

/// WebSocket configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WebSocketSettings {
    /// Maximum message size in bytes (default: 64KB)
    pub max_message_size: usize,

    /// Maximum frame size in bytes (default: 16KB)
    pub max_frame_size: usize,

    /// Heartbeat interval in milliseconds (default: 25000)
    pub heartbeat_interval_ms: u64,

    /// Extra time allowed after a missed heartbeat before closing
    pub heartbeat_grace_ms: u64,
}

/// Which presence store implementation backs the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceBackend {
    /// Shared Redis instance (multi-node)
    Redis,
    /// Process-local store (single node, tests)
    Memory,
}

/// Presence store configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PresenceSettings {
    pub backend: PresenceBackend,

    /// Seconds an online marker survives without a heartbeat
    pub online_ttl_secs: u64,

    /// Seconds a typing marker survives
    pub typing_ttl_secs: u64,

    /// Sweep interval for the in-memory backend
    pub sweep_interval_secs: u64,
}

/// Moderation engine configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ModerationSettings {
    /// Case-insensitive substrings rejected as profanity
    pub blocklist: Vec<String>,

    /// Identical messages within the window that trip the spam check
    pub spam_threshold: u64,

    /// Sliding window for the spam counter in seconds
    pub spam_window_secs: u64,

    /// Mute applied when the spam check trips
    pub spam_mute_minutes: i64,

    /// Mute applied for link sharing and profanity
    pub violation_mute_minutes: i64,

    /// Characters of the encoded content kept in the spam fingerprint
    pub fingerprint_len: usize,
}

/// At-rest encryption configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EncryptionSettings {
    /// Process-wide secret the content key is derived from
    pub secret: String,
}

/// Retention sweep configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RetentionSettings {
    /// Messages older than this many days are purged
    pub message_days: i64,

    /// How often the sweep runs in seconds (0 disables it)
    pub sweep_interval_secs: u64,
}

/// Points awarded per accepted message.
#[derive(Debug, Clone, Deserialize)]
pub struct ScoringSettings {
    pub public_points: i64,
    pub mention_points: i64,
    pub image_points: i64,
    pub private_points: i64,
    pub whisper_points: i64,
}

/// Tracing output configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetrySettings {
    /// Emit JSON log lines instead of the human-readable format
    pub json: bool,
}

/// Minimum required length for JWT secret (256 bits = 32 bytes)
pub const MIN_JWT_SECRET_LENGTH: usize = 32;

/// Minimum required length for the content encryption secret
pub const MIN_ENCRYPTION_SECRET_LENGTH: usize = 32;

/// Terms rejected when no blocklist is configured.
pub const DEFAULT_BLOCKLIST: &[&str] = &[
    "fuck", "shit", "bitch", "asshole", "bastard", "cunt", "motherfucker", "dickhead",
    "whore", "slut",
];

impl Settings {
    /// Load settings from environment variables and configuration files.
    ///
    /// The loading order is:
    /// 1. Built-in defaults
    /// 2. config/default.toml (base configuration)
    /// 3. config/{RUN_ENV}.toml (environment-specific overrides)
    /// 4. Environment variables (highest priority)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if configuration cannot be loaded or parsed,
    /// or if a secret is too short.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let environment = std::env::var("RUN_ENV").unwrap_or_else(|_| "development".into());

        Config::builder()
            .set_default("environment", environment.clone())?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.acquire_timeout", 30)?
            .set_default("database.run_migrations", true)?
            .set_default("cors.allowed_origins", vec!["http://localhost:3000"])?
            .set_default("websocket.max_message_size", 65536_i64)?
            .set_default("websocket.max_frame_size", 16384_i64)?
            .set_default("websocket.heartbeat_interval_ms", 25000_i64)?
            .set_default("websocket.heartbeat_grace_ms", 10000_i64)?
            .set_default("presence.backend", "redis")?
            .set_default("presence.online_ttl_secs", 60_i64)?
            .set_default("presence.typing_ttl_secs", 5_i64)?
            .set_default("presence.sweep_interval_secs", 30_i64)?
            .set_default("moderation.blocklist", DEFAULT_BLOCKLIST.to_vec())?
            .set_default("moderation.spam_threshold", 5_i64)?
            .set_default("moderation.spam_window_secs", 60_i64)?
            .set_default("moderation.spam_mute_minutes", 1_i64)?
            .set_default("moderation.violation_mute_minutes", 1440_i64)?
            .set_default("moderation.fingerprint_len", 24_i64)?
            .set_default("retention.message_days", 30_i64)?
            .set_default("retention.sweep_interval_secs", 3600_i64)?
            .set_default("scoring.public_points", 1_i64)?
            .set_default("scoring.mention_points", 2_i64)?
            .set_default("scoring.image_points", 2_i64)?
            .set_default("scoring.private_points", 1_i64)?
            .set_default("scoring.whisper_points", 1_i64)?
            .set_default("telemetry.json", false)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // APP__SERVER__PORT=3000 -> server.port = 3000
            .add_source(
                Environment::default()
                    .prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("server.host", std::env::var("SERVER_HOST").ok())?
            .set_override_option("server.port", std::env::var("SERVER_PORT").ok())?
            .set_override_option("database.url", std::env::var("DATABASE_URL").ok())?
            .set_override_option("redis.url", std::env::var("REDIS_URL").ok())?
            .set_override_option("jwt.secret", std::env::var("JWT_SECRET").ok())?
            .set_override_option(
                "encryption.secret",
                std::env::var("MESSAGE_ENCRYPTION_KEY").ok(),
            )?
            .build()?
            .try_deserialize()
            .and_then(|settings: Self| settings.validate().map(|_| settings))
    }

    /// Reject configurations that would weaken token or content security.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt.secret.len() < MIN_JWT_SECRET_LENGTH {
            return Err(ConfigError::Message(format!(
                "JWT secret must be at least {} characters. Current length: {}",
                MIN_JWT_SECRET_LENGTH,
                self.jwt.secret.len()
            )));
        }
        if self.encryption.secret.len() < MIN_ENCRYPTION_SECRET_LENGTH {
            return Err(ConfigError::Message(format!(
                "Encryption secret must be at least {} characters. Current length: {}",
                MIN_ENCRYPTION_SECRET_LENGTH,
                self.encryption.secret.len()
            )));
        }
        if self.moderation.spam_threshold == 0 {
            return Err(ConfigError::Message(
                "moderation.spam_threshold must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Get the full server address as a string.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for ModerationSettings {
    fn default() -> Self {
        Self {
            blocklist: DEFAULT_BLOCKLIST.iter().map(|t| t.to_string()).collect(),
            spam_threshold: 5,
            spam_window_secs: 60,
            spam_mute_minutes: 1,
            violation_mute_minutes: 1440,
            fingerprint_len: 24,
        }
    }
}

impl Default for ScoringSettings {
    fn default() -> Self {
        Self {
            public_points: 1,
            mention_points: 2,
            image_points: 2,
            private_points: 1,
            whisper_points: 1,
        }
    }
}
