//! Redis-backed presence store.
//!
//! Uses native key expiry for online, mute and typing markers. Membership
//! changes go through `MULTI/EXEC` so both indices move together. Every key a
//! script or transaction touches is named by the caller, so the layout also
//! works behind key-pattern ACLs.

use std::collections::HashSet;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};
use uuid::Uuid;

use super::keys;
use super::presence_store::{PresenceStatus, PresenceStore};
use crate::shared::error::AppError;

/// INCR, and set the window expiry only on the first hit.
static INCREMENT_WINDOW: Lazy<Script> = Lazy::new(|| {
    Script::new(
        r"
        local count = redis.call('INCR', KEYS[1])
        if count == 1 then
            redis.call('EXPIRE', KEYS[1], ARGV[1])
        end
        return count
        ",
    )
});

/// Presence store over a shared Redis instance.
#[derive(Clone)]
pub struct RedisPresenceStore {
    redis: ConnectionManager,
    online_ttl: u64,
    typing_ttl: u64,
}

impl RedisPresenceStore {
    pub fn new(redis: ConnectionManager, online_ttl: u64, typing_ttl: u64) -> Self {
        Self {
            redis,
            online_ttl: online_ttl.max(1),
            typing_ttl: typing_ttl.max(1),
        }
    }

    fn parse_ids(raw: Vec<String>) -> HashSet<Uuid> {
        raw.iter().filter_map(|s| Uuid::parse_str(s).ok()).collect()
    }

    /// Remove `member` from every counterpart set listed in `index`, and
    /// those entries from `index`, in one `MULTI/EXEC`. Entries added after
    /// the read stay paired in both indices.
    async fn clear_index<F>(&self, index: String, member: String, counterpart: F) -> Result<usize, AppError>
    where
        F: Fn(&str) -> String,
    {
        let mut conn = self.redis.clone();
        let entries: Vec<String> = conn.smembers(&index).await?;
        if entries.is_empty() {
            return Ok(0);
        }

        let mut pipe = redis::pipe();
        pipe.atomic();
        for entry in &entries {
            pipe.srem(counterpart(entry.as_str()), &member).ignore();
        }
        pipe.srem(&index, &entries).ignore();
        let _: () = pipe.query_async(&mut conn).await?;
        Ok(entries.len())
    }
}

#[async_trait]
impl PresenceStore for RedisPresenceStore {
    async fn set_online(&self, user_id: Uuid) -> Result<(), AppError> {
        let mut conn = self.redis.clone();
        let timestamp = chrono::Utc::now().timestamp();
        conn.set_ex::<_, _, ()>(keys::presence(user_id), timestamp, self.online_ttl)
            .await?;
        Ok(())
    }

    async fn set_offline(&self, user_id: Uuid) -> Result<(), AppError> {
        let mut conn = self.redis.clone();
        conn.del::<_, ()>(keys::presence(user_id)).await?;
        Ok(())
    }

    async fn status(&self, user_id: Uuid) -> Result<PresenceStatus, AppError> {
        let mut conn = self.redis.clone();
        let exists: bool = conn.exists(keys::presence(user_id)).await?;
        Ok(if exists {
            PresenceStatus::Online
        } else {
            PresenceStatus::Offline
        })
    }

    async fn mute(&self, user_id: Uuid, seconds: u64) -> Result<(), AppError> {
        if seconds == 0 {
            return self.unmute(user_id).await;
        }
        let mut conn = self.redis.clone();
        conn.set_ex::<_, _, ()>(keys::mute(user_id), 1, seconds).await?;
        Ok(())
    }

    async fn unmute(&self, user_id: Uuid) -> Result<(), AppError> {
        let mut conn = self.redis.clone();
        conn.del::<_, ()>(keys::mute(user_id)).await?;
        Ok(())
    }

    async fn is_muted(&self, user_id: Uuid) -> Result<bool, AppError> {
        let mut conn = self.redis.clone();
        let exists: bool = conn.exists(keys::mute(user_id)).await?;
        Ok(exists)
    }

    async fn set_typing(&self, user_id: Uuid, room_id: Uuid) -> Result<(), AppError> {
        let mut conn = self.redis.clone();
        conn.set_ex::<_, _, ()>(keys::typing(room_id, user_id), 1, self.typing_ttl)
            .await?;
        Ok(())
    }

    async fn clear_typing(&self, user_id: Uuid, room_id: Uuid) -> Result<(), AppError> {
        let mut conn = self.redis.clone();
        conn.del::<_, ()>(keys::typing(room_id, user_id)).await?;
        Ok(())
    }

    async fn is_typing(&self, user_id: Uuid, room_id: Uuid) -> Result<bool, AppError> {
        let mut conn = self.redis.clone();
        let exists: bool = conn.exists(keys::typing(room_id, user_id)).await?;
        Ok(exists)
    }

    async fn add_room_member(&self, room_id: Uuid, user_id: Uuid) -> Result<(), AppError> {
        let mut conn = self.redis.clone();
        let _: () = redis::pipe()
            .atomic()
            .sadd(keys::room_members(room_id), user_id.to_string())
            .ignore()
            .sadd(keys::user_rooms(user_id), room_id.to_string())
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn remove_room_member(&self, room_id: Uuid, user_id: Uuid) -> Result<(), AppError> {
        let mut conn = self.redis.clone();
        let _: () = redis::pipe()
            .atomic()
            .srem(keys::room_members(room_id), user_id.to_string())
            .ignore()
            .srem(keys::user_rooms(user_id), room_id.to_string())
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn room_members(&self, room_id: Uuid) -> Result<HashSet<Uuid>, AppError> {
        let mut conn = self.redis.clone();
        let raw: Vec<String> = conn.smembers(keys::room_members(room_id)).await?;
        Ok(Self::parse_ids(raw))
    }

    async fn user_rooms(&self, user_id: Uuid) -> Result<HashSet<Uuid>, AppError> {
        let mut conn = self.redis.clone();
        let raw: Vec<String> = conn.smembers(keys::user_rooms(user_id)).await?;
        Ok(Self::parse_ids(raw))
    }

    async fn clear_user_rooms(&self, user_id: Uuid) -> Result<(), AppError> {
        let removed = self
            .clear_index(keys::user_rooms(user_id), user_id.to_string(), |room: &str| {
                keys::room_members(room)
            })
            .await?;
        tracing::trace!(user_id = %user_id, removed, "Cleared user room index");
        Ok(())
    }

    async fn clear_room(&self, room_id: Uuid) -> Result<(), AppError> {
        let removed = self
            .clear_index(keys::room_members(room_id), room_id.to_string(), |user: &str| {
                keys::user_rooms(user)
            })
            .await?;
        tracing::trace!(room_id = %room_id, removed, "Cleared room member index");
        Ok(())
    }

    async fn count_room_members(&self, room_id: Uuid) -> Result<usize, AppError> {
        let mut conn = self.redis.clone();
        let count: usize = conn.scard(keys::room_members(room_id)).await?;
        Ok(count)
    }

    async fn online_users(&self) -> Result<HashSet<Uuid>, AppError> {
        let mut conn = self.redis.clone();
        let raw: Vec<String> = redis::cmd("KEYS")
            .arg(format!("{}*", keys::USER_PRESENCE))
            .query_async(&mut conn)
            .await?;
        Ok(raw
            .iter()
            .filter_map(|k| k.strip_prefix(keys::USER_PRESENCE))
            .filter_map(|id| Uuid::parse_str(id).ok())
            .collect())
    }

    async fn increment_window(&self, key: &str, window_secs: u64) -> Result<u64, AppError> {
        let mut conn = self.redis.clone();
        let count: u64 = INCREMENT_WINDOW
            .key(key)
            .arg(window_secs.max(1))
            .invoke_async(&mut conn)
            .await?;
        Ok(count)
    }

    async fn ping(&self) -> Result<(), AppError> {
        let mut conn = self.redis.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}
