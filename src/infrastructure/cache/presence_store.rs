//! Presence Store contract.
//!
//! Ephemeral, keyed state shared by every gateway instance: online markers,
//! mute mirrors, typing markers, the room membership dual index and the
//! windowed counters used by the spam check.
//!
//! Every time-limited entry expires on its own. A missing entry always reads
//! as the negative state (offline, unmuted, not typing), so no sweep is needed
//! for correctness.

use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shared::error::AppError;

/// Liveness as reported by the presence store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Offline,
}

/// Ephemeral presence state.
///
/// Room membership is not time-limited; it is removed explicitly on leave and
/// disconnect. Add and remove update both indices as one unit.
#[async_trait]
pub trait PresenceStore: Send + Sync {
    /// Mark a user online for the configured TTL (refreshes an existing marker).
    async fn set_online(&self, user_id: Uuid) -> Result<(), AppError>;

    async fn set_offline(&self, user_id: Uuid) -> Result<(), AppError>;

    async fn status(&self, user_id: Uuid) -> Result<PresenceStatus, AppError>;

    /// Mirror a mute for `seconds`. Last write wins.
    async fn mute(&self, user_id: Uuid, seconds: u64) -> Result<(), AppError>;

    async fn unmute(&self, user_id: Uuid) -> Result<(), AppError>;

    async fn is_muted(&self, user_id: Uuid) -> Result<bool, AppError>;

    /// Mark a user typing in a room for the configured typing TTL.
    async fn set_typing(&self, user_id: Uuid, room_id: Uuid) -> Result<(), AppError>;

    async fn clear_typing(&self, user_id: Uuid, room_id: Uuid) -> Result<(), AppError>;

    async fn is_typing(&self, user_id: Uuid, room_id: Uuid) -> Result<bool, AppError>;

    async fn add_room_member(&self, room_id: Uuid, user_id: Uuid) -> Result<(), AppError>;

    async fn remove_room_member(&self, room_id: Uuid, user_id: Uuid) -> Result<(), AppError>;

    async fn room_members(&self, room_id: Uuid) -> Result<HashSet<Uuid>, AppError>;

    async fn user_rooms(&self, user_id: Uuid) -> Result<HashSet<Uuid>, AppError>;

    /// Remove the user from every room and drop the user's room index.
    async fn clear_user_rooms(&self, user_id: Uuid) -> Result<(), AppError>;

    /// Remove every member from a room and drop the room's member index.
    async fn clear_room(&self, room_id: Uuid) -> Result<(), AppError>;

    async fn count_room_members(&self, room_id: Uuid) -> Result<usize, AppError>;

    /// Every user with a live online marker.
    ///
    /// Enumerates the whole presence namespace; cost grows with total keys.
    async fn online_users(&self) -> Result<HashSet<Uuid>, AppError>;

    /// Atomically increment a counter. The first hit of a window sets the
    /// window's expiry. Returns the count after the increment.
    async fn increment_window(&self, key: &str, window_secs: u64) -> Result<u64, AppError>;

    /// Round-trip check used by readiness probes.
    async fn ping(&self) -> Result<(), AppError>;
}
