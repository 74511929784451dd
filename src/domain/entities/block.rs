//! Block graph access.
//!
//! Directed edges in the `user_blocks` table, unique per ordered pair. The
//! gateway only reads this relation.

use async_trait::async_trait;
use uuid::Uuid;

use crate::shared::error::AppError;

/// Read access to the block graph.
#[async_trait]
pub trait BlockRepository: Send + Sync {
    /// Whether `blocker` has blocked `blocked`.
    async fn is_blocked(&self, blocker: Uuid, blocked: Uuid) -> Result<bool, AppError>;

    /// Users that `blocker` has blocked.
    async fn find_blocked(&self, blocker: Uuid) -> Result<Vec<Uuid>, AppError>;

    /// Users that have blocked `blocked`.
    async fn find_blockers(&self, blocked: Uuid) -> Result<Vec<Uuid>, AppError>;

    /// Whether either user has blocked the other.
    async fn either_blocked(&self, a: Uuid, b: Uuid) -> Result<bool, AppError> {
        Ok(self.is_blocked(a, b).await? || self.is_blocked(b, a).await?)
    }
}
