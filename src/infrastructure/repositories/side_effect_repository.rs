//! Side-effect sinks backed by PostgreSQL.
//!
//! Notifications, the moderation audit trail and gamification scores. Callers
//! treat failures here as non-fatal.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{AuditEntry, AuditLog, Badge, Notification, NotificationSink, ScoreRepository};
use crate::shared::error::AppError;

/// Writes notifications to the `notifications` table for the notification
/// service to pick up.
#[derive(Clone)]
pub struct PgNotificationSink {
    pool: PgPool,
}

impl PgNotificationSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationSink for PgNotificationSink {
    async fn notify(&self, notification: Notification) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO notifications (user_id, kind, title, body, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(notification.user_id)
        .bind(notification.kind.as_str())
        .bind(&notification.title)
        .bind(&notification.body)
        .bind(notification.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// Append-only moderation audit log.
#[derive(Clone)]
pub struct PgAuditLog {
    pool: PgPool,
}

impl PgAuditLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditLog for PgAuditLog {
    async fn record(&self, entry: AuditEntry) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO moderation_audit_log
                (actor, action, target_user, reason, metadata, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(entry.actor.label())
        .bind(&entry.action)
        .bind(entry.target_user)
        .bind(&entry.reason)
        .bind(&entry.metadata)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// Points and badges.
#[derive(Clone)]
pub struct PgScoreRepository {
    pool: PgPool,
}

impl PgScoreRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ScoreRepository for PgScoreRepository {
    async fn add_points(&self, user_id: Uuid, points: i64) -> Result<i64, AppError> {
        let total: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO user_scores (user_id, points)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO UPDATE
            SET points = user_scores.points + EXCLUDED.points, updated_at = NOW()
            RETURNING points
            "#,
        )
        .bind(user_id)
        .bind(points)
        .fetch_one(&self.pool)
        .await?;

        Ok(total)
    }

    async fn award_badge(&self, user_id: Uuid, badge: Badge) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO user_badges (user_id, badge)
            VALUES ($1, $2)
            ON CONFLICT (user_id, badge) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(badge.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
