//! User entity and repository trait.
//!
//! Account CRUD lives in the external identity service. The gateway only
//! reads identities and owns the durable mute columns of the `users` table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shared::error::AppError;

/// Represents a user account as seen by the gateway.
///
/// Maps to the `users` table:
/// - id: UUID PRIMARY KEY
/// - username: VARCHAR(32) NULL UNIQUE (case-insensitive index)
/// - email: VARCHAR(255) NOT NULL UNIQUE
/// - avatar_url: TEXT NULL
/// - is_guest: BOOLEAN NOT NULL DEFAULT FALSE
/// - muted_until: TIMESTAMPTZ NULL
/// - mute_reason: TEXT NULL
/// - created_at: TIMESTAMPTZ NOT NULL DEFAULT NOW()
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,

    /// Username (may be unset for accounts created from an email invite)
    pub username: Option<String>,

    pub email: String,

    pub avatar_url: Option<String>,

    /// Guest accounts cannot send media
    pub is_guest: bool,

    /// Durable mute expiry written by the moderation engine
    pub muted_until: Option<DateTime<Utc>>,

    pub mute_reason: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl User {
    /// Name shown to other users.
    ///
    /// Falls back to the local part of the email address when no username
    /// has been chosen.
    pub fn display_name(&self) -> String {
        match self.username.as_deref() {
            Some(name) if !name.trim().is_empty() => name.to_string(),
            _ => self
                .email
                .split('@')
                .next()
                .unwrap_or_default()
                .to_string(),
        }
    }

    /// Whether the durable mute record is still in force at `now`.
    pub fn is_muted_at(&self, now: DateTime<Utc>) -> bool {
        self.muted_until.map(|until| until > now).unwrap_or(false)
    }
}

/// Repository trait for the identity lookups and mute state the gateway needs.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Find a user by id.
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError>;

    /// Find a user by username, ignoring case.
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError>;

    /// Load several users at once. Unknown ids are skipped.
    async fn find_many(&self, ids: &[Uuid]) -> Result<Vec<User>, AppError>;

    /// Write the durable mute record.
    async fn set_mute(
        &self,
        id: Uuid,
        until: DateTime<Utc>,
        reason: &str,
    ) -> Result<(), AppError>;

    /// Clear the durable mute record.
    async fn clear_mute(&self, id: Uuid) -> Result<(), AppError>;
}
