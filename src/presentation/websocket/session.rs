//! WebSocket Session Management
//!
//! Per-connection state owned by the connection task.

use std::collections::HashSet;
use std::time::Duration;

use tokio::time::Instant;
use uuid::Uuid;

use crate::domain::User;

/// Registry key of a live connection.
pub type ConnectionId = Uuid;

/// WebSocket session state
#[derive(Debug)]
pub struct Session {
    pub connection_id: ConnectionId,
    /// Verified identity; `None` for anonymous connections
    pub user: Option<User>,
    /// Rooms this connection has joined
    pub joined_rooms: HashSet<Uuid>,
    /// Rooms that already produced JOIN/WELCOME for this connection
    pub welcomed_rooms: HashSet<Uuid>,
    pub inbox_joined: bool,
    pub last_heartbeat: Instant,
}

impl Session {
    pub fn new(connection_id: ConnectionId, user: Option<User>) -> Self {
        Self {
            connection_id,
            user,
            joined_rooms: HashSet::new(),
            welcomed_rooms: HashSet::new(),
            inbox_joined: false,
            last_heartbeat: Instant::now(),
        }
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.user.as_ref().map(|u| u.id)
    }

    pub fn heartbeat(&mut self) {
        self.last_heartbeat = Instant::now();
    }

    pub fn is_alive(&self, timeout: Duration) -> bool {
        self.last_heartbeat.elapsed() < timeout
    }
}
