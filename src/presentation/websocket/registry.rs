//! Connection Registry
//!
//! Live connections of this gateway instance and the broadcast topics they
//! subscribe to. DashMap guards are never held across an `.await`.

use std::collections::HashSet;

use dashmap::DashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::messages::ServerEvent;
use super::session::ConnectionId;

/// A broadcast group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Everyone who joined a room
    Room(Uuid),
    /// Every connection of one user that joined its own inbox
    Inbox(Uuid),
}

/// Connected session with message sender
struct Connection {
    user_id: Option<Uuid>,
    sender: mpsc::UnboundedSender<ServerEvent>,
    topics: HashSet<Topic>,
}

/// Registry of live connections.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, Connection>,
    /// User ID to connection IDs (one user can have multiple connections)
    user_connections: DashMap<Uuid, HashSet<ConnectionId>>,
    topics: DashMap<Topic, HashSet<ConnectionId>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, id: ConnectionId, sender: mpsc::UnboundedSender<ServerEvent>) {
        self.connections.insert(
            id,
            Connection {
                user_id: None,
                sender,
                topics: HashSet::new(),
            },
        );
    }

    /// Attach a verified identity to a connection.
    pub fn identify(&self, id: ConnectionId, user_id: Uuid) {
        if let Some(mut conn) = self.connections.get_mut(&id) {
            conn.user_id = Some(user_id);
        } else {
            return;
        }
        self.user_connections.entry(user_id).or_default().insert(id);
    }

    /// Remove a connection and all of its subscriptions.
    pub fn unregister(&self, id: ConnectionId) {
        let Some((_, conn)) = self.connections.remove(&id) else {
            return;
        };

        for topic in &conn.topics {
            self.remove_from_topic(*topic, id);
        }

        if let Some(user_id) = conn.user_id {
            let empty = match self.user_connections.get_mut(&user_id) {
                Some(mut ids) => {
                    ids.remove(&id);
                    ids.is_empty()
                }
                None => false,
            };
            if empty {
                self.user_connections.remove_if(&user_id, |_, ids| ids.is_empty());
            }
        }
    }

    /// Subscribe a connection to a topic. Returns false when it already was.
    pub fn subscribe(&self, id: ConnectionId, topic: Topic) -> bool {
        let added = match self.connections.get_mut(&id) {
            Some(mut conn) => conn.topics.insert(topic),
            None => return false,
        };
        self.topics.entry(topic).or_default().insert(id);
        added
    }

    pub fn unsubscribe(&self, id: ConnectionId, topic: Topic) {
        if let Some(mut conn) = self.connections.get_mut(&id) {
            conn.topics.remove(&topic);
        }
        self.remove_from_topic(topic, id);
    }

    fn remove_from_topic(&self, topic: Topic, id: ConnectionId) {
        let empty = match self.topics.get_mut(&topic) {
            Some(mut ids) => {
                ids.remove(&id);
                ids.is_empty()
            }
            None => false,
        };
        if empty {
            self.topics.remove_if(&topic, |_, ids| ids.is_empty());
        }
    }

    /// Connections subscribed to a topic, with their identities.
    pub fn subscribers(&self, topic: Topic) -> Vec<(ConnectionId, Option<Uuid>)> {
        let ids: Vec<ConnectionId> = match self.topics.get(&topic) {
            Some(ids) => ids.iter().copied().collect(),
            None => return Vec::new(),
        };
        ids.into_iter()
            .filter_map(|id| self.connections.get(&id).map(|c| (id, c.user_id)))
            .collect()
    }

    /// Whether any connection of `user_id` other than `except` is subscribed.
    pub fn user_subscribed(&self, user_id: Uuid, topic: Topic, except: ConnectionId) -> bool {
        self.subscribers(topic)
            .into_iter()
            .any(|(id, uid)| id != except && uid == Some(user_id))
    }

    /// Queue an event for one connection. Returns false if it is gone.
    pub fn send(&self, id: ConnectionId, event: ServerEvent) -> bool {
        match self.connections.get(&id) {
            Some(conn) => conn.sender.send(event).is_ok(),
            None => false,
        }
    }

    /// Drop a topic entirely. Returns the connections that were subscribed.
    pub fn close_topic(&self, topic: Topic) -> Vec<ConnectionId> {
        let ids: Vec<ConnectionId> = match self.topics.remove(&topic) {
            Some((_, ids)) => ids.into_iter().collect(),
            None => return Vec::new(),
        };
        for id in &ids {
            if let Some(mut conn) = self.connections.get_mut(id) {
                conn.topics.remove(&topic);
            }
        }
        ids
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn identified_count(&self) -> usize {
        self.user_connections.iter().map(|e| e.value().len()).sum()
    }

    pub fn user_connection_count(&self, user_id: Uuid) -> usize {
        self.user_connections
            .get(&user_id)
            .map(|ids| ids.len())
            .unwrap_or(0)
    }

    pub fn is_user_online(&self, user_id: Uuid) -> bool {
        self.user_connection_count(user_id) > 0
    }
}
