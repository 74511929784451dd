//! In-process presence store.
//!
//! Single-instance deployments and tests. Expiry is evaluated lazily on read
//! against `tokio::time::Instant`, so paused-clock tests can advance time.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;
use uuid::Uuid;

use super::presence_store::{PresenceStatus, PresenceStore};
use crate::shared::error::AppError;

#[derive(Default)]
struct State {
    online: HashMap<Uuid, Instant>,
    muted: HashMap<Uuid, Instant>,
    typing: HashMap<(Uuid, Uuid), Instant>,
    room_members: HashMap<Uuid, HashSet<Uuid>>,
    user_rooms: HashMap<Uuid, HashSet<Uuid>>,
    counters: HashMap<String, (u64, Instant)>,
}

impl State {
    fn unlink(&mut self, room_id: Uuid, user_id: Uuid) {
        if let Some(members) = self.room_members.get_mut(&room_id) {
            members.remove(&user_id);
            if members.is_empty() {
                self.room_members.remove(&room_id);
            }
        }
        if let Some(rooms) = self.user_rooms.get_mut(&user_id) {
            rooms.remove(&room_id);
            if rooms.is_empty() {
                self.user_rooms.remove(&user_id);
            }
        }
    }
}

fn live<K: std::hash::Hash + Eq>(map: &mut HashMap<K, Instant>, key: &K, now: Instant) -> bool {
    match map.get(key) {
        Some(expires) if *expires > now => true,
        Some(_) => {
            map.remove(key);
            false
        }
        None => false,
    }
}

/// Presence store held in process memory.
pub struct MemoryPresenceStore {
    state: Mutex<State>,
    online_ttl: Duration,
    typing_ttl: Duration,
}

impl MemoryPresenceStore {
    pub fn new(online_ttl_secs: u64, typing_ttl_secs: u64) -> Self {
        Self {
            state: Mutex::new(State::default()),
            online_ttl: Duration::from_secs(online_ttl_secs.max(1)),
            typing_ttl: Duration::from_secs(typing_ttl_secs.max(1)),
        }
    }

    /// Drop every expired entry. Reads already ignore them; this bounds memory.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut state = self.state.lock();
        let before = state.online.len()
            + state.muted.len()
            + state.typing.len()
            + state.counters.len();

        state.online.retain(|_, exp| *exp > now);
        state.muted.retain(|_, exp| *exp > now);
        state.typing.retain(|_, exp| *exp > now);
        state.counters.retain(|_, (_, exp)| *exp > now);

        before
            - (state.online.len() + state.muted.len() + state.typing.len() + state.counters.len())
    }
}

impl Default for MemoryPresenceStore {
    fn default() -> Self {
        Self::new(300, 5)
    }
}

#[async_trait]
impl PresenceStore for MemoryPresenceStore {
    async fn set_online(&self, user_id: Uuid) -> Result<(), AppError> {
        let expires = Instant::now() + self.online_ttl;
        self.state.lock().online.insert(user_id, expires);
        Ok(())
    }

    async fn set_offline(&self, user_id: Uuid) -> Result<(), AppError> {
        self.state.lock().online.remove(&user_id);
        Ok(())
    }

    async fn status(&self, user_id: Uuid) -> Result<PresenceStatus, AppError> {
        let mut state = self.state.lock();
        Ok(if live(&mut state.online, &user_id, Instant::now()) {
            PresenceStatus::Online
        } else {
            PresenceStatus::Offline
        })
    }

    async fn mute(&self, user_id: Uuid, seconds: u64) -> Result<(), AppError> {
        let mut state = self.state.lock();
        if seconds == 0 {
            state.muted.remove(&user_id);
        } else {
            state
                .muted
                .insert(user_id, Instant::now() + Duration::from_secs(seconds));
        }
        Ok(())
    }

    async fn unmute(&self, user_id: Uuid) -> Result<(), AppError> {
        self.state.lock().muted.remove(&user_id);
        Ok(())
    }

    async fn is_muted(&self, user_id: Uuid) -> Result<bool, AppError> {
        let mut state = self.state.lock();
        Ok(live(&mut state.muted, &user_id, Instant::now()))
    }

    async fn set_typing(&self, user_id: Uuid, room_id: Uuid) -> Result<(), AppError> {
        let expires = Instant::now() + self.typing_ttl;
        self.state.lock().typing.insert((room_id, user_id), expires);
        Ok(())
    }

    async fn clear_typing(&self, user_id: Uuid, room_id: Uuid) -> Result<(), AppError> {
        self.state.lock().typing.remove(&(room_id, user_id));
        Ok(())
    }

    async fn is_typing(&self, user_id: Uuid, room_id: Uuid) -> Result<bool, AppError> {
        let mut state = self.state.lock();
        Ok(live(&mut state.typing, &(room_id, user_id), Instant::now()))
    }

    async fn add_room_member(&self, room_id: Uuid, user_id: Uuid) -> Result<(), AppError> {
        let mut state = self.state.lock();
        state.room_members.entry(room_id).or_default().insert(user_id);
        state.user_rooms.entry(user_id).or_default().insert(room_id);
        Ok(())
    }

    async fn remove_room_member(&self, room_id: Uuid, user_id: Uuid) -> Result<(), AppError> {
        self.state.lock().unlink(room_id, user_id);
        Ok(())
    }

    async fn room_members(&self, room_id: Uuid) -> Result<HashSet<Uuid>, AppError> {
        Ok(self
            .state
            .lock()
            .room_members
            .get(&room_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn user_rooms(&self, user_id: Uuid) -> Result<HashSet<Uuid>, AppError> {
        Ok(self
            .state
            .lock()
            .user_rooms
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn clear_user_rooms(&self, user_id: Uuid) -> Result<(), AppError> {
        let mut state = self.state.lock();
        let rooms = state.user_rooms.remove(&user_id).unwrap_or_default();
        for room_id in rooms {
            state.unlink(room_id, user_id);
        }
        Ok(())
    }

    async fn clear_room(&self, room_id: Uuid) -> Result<(), AppError> {
        let mut state = self.state.lock();
        let members = state.room_members.remove(&room_id).unwrap_or_default();
        for user_id in members {
            state.unlink(room_id, user_id);
        }
        Ok(())
    }

    async fn count_room_members(&self, room_id: Uuid) -> Result<usize, AppError> {
        Ok(self
            .state
            .lock()
            .room_members
            .get(&room_id)
            .map(HashSet::len)
            .unwrap_or(0))
    }

    async fn online_users(&self) -> Result<HashSet<Uuid>, AppError> {
        let now = Instant::now();
        let mut state = self.state.lock();
        state.online.retain(|_, exp| *exp > now);
        Ok(state.online.keys().copied().collect())
    }

    async fn increment_window(&self, key: &str, window_secs: u64) -> Result<u64, AppError> {
        let now = Instant::now();
        let window = Duration::from_secs(window_secs.max(1));
        let mut state = self.state.lock();
        let entry = state
            .counters
            .entry(key.to_string())
            .or_insert((0, now + window));
        if entry.1 <= now {
            *entry = (0, now + window);
        }
        entry.0 += 1;
        Ok(entry.0)
    }

    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}
