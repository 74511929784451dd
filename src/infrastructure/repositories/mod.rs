//! Repository Implementations
//!
//! PostgreSQL implementations of domain repository traits.
//!
//! ## Available Repositories
//!
//! - **UserRepository** - Identity lookups and durable mute state
//! - **RoomRepository** - Room metadata with soft deletion
//! - **MessageRepository** - Message storage, history and retention
//! - **BlockRepository** - Read-only block graph
//! - **NotificationSink / AuditLog / ScoreRepository** - Side-effect tables
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! use sqlx::PgPool;
//! use crate::infrastructure::repositories::{PgMessageRepository, PgRoomRepository};
//!
//! async fn setup_repositories(pool: PgPool) {
//!     let messages = PgMessageRepository::new(pool.clone());
//!     let rooms = PgRoomRepository::new(pool.clone());
//! }
//! ```

pub mod block_repository;
pub mod message_repository;
pub mod room_repository;
pub mod side_effect_repository;
pub mod user_repository;

pub use block_repository::PgBlockRepository;
pub use message_repository::PgMessageRepository;
pub use room_repository::PgRoomRepository;
pub use side_effect_repository::{PgAuditLog, PgNotificationSink, PgScoreRepository};
pub use user_repository::PgUserRepository;
