//! # Domain Entities
//!
//! Core domain entities of the chat gateway. Durable entities map to their
//! corresponding database tables.
//!
//! ## Core Entities
//!
//! - **User**: Identity record as seen by the gateway (lookup + mute state)
//! - **Room**: A public or private chat room with soft-delete lifecycle
//! - **Message**: A persisted chat message with visibility flags
//! - **BlockRepository**: Directed "A blocked B" relation
//!
//! ## Side-effect Sinks
//!
//! - **Notification**: User-facing notification delivered by an external sink
//! - **AuditEntry**: Moderation audit trail
//! - **Score**: Gamification points and badges
//!
//! ## Repository Traits
//!
//! Each entity has an associated repository trait defining data access operations.
//! These traits are implemented in the infrastructure layer, following the
//! dependency inversion principle.

mod audit;
mod block;
mod message;
mod notification;
mod room;
mod score;
mod user;

pub use audit::{AuditActor, AuditEntry, AuditLog, AUTO_MODERATOR};
pub use block::BlockRepository;
pub use message::{Message, MessageRepository, MessageType, NewMessage, HIDDEN_MESSAGE_PLACEHOLDER};
pub use notification::{Notification, NotificationKind, NotificationSink};
pub use room::{NewRoom, Room, RoomRepository, RoomType};
pub use score::{Badge, ScoreRepository};
pub use user::{User, UserRepository};

#[cfg(test)]
pub use audit::MockAuditLog;
#[cfg(test)]
pub use notification::MockNotificationSink;
#[cfg(test)]
pub use user::MockUserRepository;
