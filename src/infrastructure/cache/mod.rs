//! Cache Module
//!
//! Redis connection management and the Presence Store.
//!
//! This module provides:
//! - Redis connection management with automatic reconnection
//! - The `PresenceStore` trait for ephemeral, expiring presence state
//! - `RedisPresenceStore` for multi-instance deployments
//! - `MemoryPresenceStore` for single-instance runs and tests
//! - Predefined key builders for consistent key naming
//!
//! # Architecture
//!
//! ```text
//! +----------------------+
//! |  Gateway / Services  |
//! +----------------------+
//!            |
//!            v
//! +----------------------+
//! |  PresenceStore trait |  <-- Abstract interface
//! +----------------------+
//!        |          |
//!        v          v
//! +-----------+ +-----------+
//! |   Redis   | |  Memory   |
//! +-----------+ +-----------+
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use chat_gateway::infrastructure::cache::{create_redis_client, RedisPresenceStore};
//!
//! let conn = create_redis_client(&settings.redis).await?;
//! let presence = RedisPresenceStore::new(conn, 300, 5);
//! presence.set_online(user_id).await?;
//! ```

mod memory_presence;
mod presence_store;
mod redis_presence;

pub use memory_presence::MemoryPresenceStore;
pub use presence_store::{PresenceStatus, PresenceStore};
pub use redis_presence::RedisPresenceStore;

use redis::aio::ConnectionManager;
use redis::Client;
use tracing::{info, instrument};

use crate::config::RedisSettings;

/// Creates a Redis connection manager with automatic reconnection.
///
/// # Arguments
/// * `settings` - Redis configuration settings
///
/// # Returns
/// * `Ok(ConnectionManager)` - On successful connection
/// * `Err(redis::RedisError)` - If connection fails
#[instrument(skip(settings), fields(url = %settings.url))]
pub async fn create_redis_client(
    settings: &RedisSettings,
) -> Result<ConnectionManager, redis::RedisError> {
    info!("Connecting to Redis...");
    let client = Client::open(settings.url.as_str())?;
    let manager = ConnectionManager::new(client).await?;
    info!("Redis connection established");
    Ok(manager)
}

/// Presence key builders.
///
/// Use these to keep the Redis layout identical across gateway instances.
///
/// # Example
/// ```rust,ignore
/// use chat_gateway::infrastructure::cache::keys;
///
/// let key = keys::typing(room_id, user_id);
/// ```
pub mod keys {
    /// Online marker (e.g., "presence:user_id")
    pub const USER_PRESENCE: &str = "presence:";

    /// Mute mirror (e.g., "mute:user_id")
    pub const MUTE: &str = "mute:";

    /// Typing marker (e.g., "typing:room_id:user_id")
    pub const TYPING: &str = "typing:";

    /// Room to members index (e.g., "room:active:room_id")
    pub const ROOM_MEMBERS: &str = "room:active:";

    /// User to rooms index (e.g., "user:rooms:user_id")
    pub const USER_ROOMS: &str = "user:rooms:";

    /// Duplicate-content counters (e.g., "spam:user_id:fingerprint")
    pub const SPAM: &str = "spam:";

    #[inline]
    pub fn presence(user_id: impl std::fmt::Display) -> String {
        format!("{}{}", USER_PRESENCE, user_id)
    }

    #[inline]
    pub fn mute(user_id: impl std::fmt::Display) -> String {
        format!("{}{}", MUTE, user_id)
    }

    #[inline]
    pub fn typing(room_id: impl std::fmt::Display, user_id: impl std::fmt::Display) -> String {
        format!("{}{}:{}", TYPING, room_id, user_id)
    }

    #[inline]
    pub fn room_members(room_id: impl std::fmt::Display) -> String {
        format!("{}{}", ROOM_MEMBERS, room_id)
    }

    #[inline]
    pub fn user_rooms(user_id: impl std::fmt::Display) -> String {
        format!("{}{}", USER_ROOMS, user_id)
    }

    #[inline]
    pub fn spam(user_id: impl std::fmt::Display, fingerprint: &str) -> String {
        format!("{}{}:{}", SPAM, user_id, fingerprint)
    }
}
