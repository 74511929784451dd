//! Moderation audit log.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shared::error::AppError;

/// Identity recorded for actions taken by the moderation engine itself.
pub const AUTO_MODERATOR: &str = "auto-moderator";

/// Who performed an audited action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum AuditActor {
    System(String),
    User(Uuid),
}

impl AuditActor {
    pub fn auto_moderator() -> Self {
        Self::System(AUTO_MODERATOR.to_string())
    }

    pub fn label(&self) -> String {
        match self {
            Self::System(name) => name.clone(),
            Self::User(id) => id.to_string(),
        }
    }
}

/// One audit trail entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub actor: AuditActor,
    pub action: String,
    pub target_user: Option<Uuid>,
    pub reason: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Append-only audit log capability, injected at construction time.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn record(&self, entry: AuditEntry) -> Result<(), AppError>;
}
