//! Application Services
//!
//! Business logic services that coordinate domain operations.
//!
//! ## Available Services
//!
//! - **ModerationService**: Classifiers and the violation handler
//! - **MessageService**: Message store with at-rest encryption
//! - **RoomService**: Room registry
//! - **ScoringService**: Gamification side effects

pub mod message_service;
pub mod moderation_service;
pub mod room_service;
pub mod scoring_service;

pub use message_service::{MessageService, SaveMessage, HISTORY_LIMIT};
pub use moderation_service::{ModerationService, MuteRecord, ViolationReason};
pub use room_service::RoomService;
pub use scoring_service::ScoringService;
