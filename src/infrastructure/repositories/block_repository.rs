//! Block Repository Implementation
//!
//! Read-only access to the `user_blocks` relation.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::BlockRepository;
use crate::shared::error::AppError;

/// PostgreSQL block graph reader.
#[derive(Clone)]
pub struct PgBlockRepository {
    pool: PgPool,
}

impl PgBlockRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BlockRepository for PgBlockRepository {
    async fn is_blocked(&self, blocker: Uuid, blocked: Uuid) -> Result<bool, AppError> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM user_blocks
                WHERE blocker_id = $1 AND blocked_id = $2
            )
            "#,
        )
        .bind(blocker)
        .bind(blocked)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn find_blocked(&self, blocker: Uuid) -> Result<Vec<Uuid>, AppError> {
        let ids: Vec<Uuid> =
            sqlx::query_scalar("SELECT blocked_id FROM user_blocks WHERE blocker_id = $1")
                .bind(blocker)
                .fetch_all(&self.pool)
                .await?;

        Ok(ids)
    }

    async fn find_blockers(&self, blocked: Uuid) -> Result<Vec<Uuid>, AppError> {
        let ids: Vec<Uuid> =
            sqlx::query_scalar("SELECT blocker_id FROM user_blocks WHERE blocked_id = $1")
                .bind(blocked)
                .fetch_all(&self.pool)
                .await?;

        Ok(ids)
    }

    /// Single round trip instead of two lookups.
    async fn either_blocked(&self, a: Uuid, b: Uuid) -> Result<bool, AppError> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM user_blocks
                WHERE (blocker_id = $1 AND blocked_id = $2)
                   OR (blocker_id = $2 AND blocked_id = $1)
            )
            "#,
        )
        .bind(a)
        .bind(b)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }
}
