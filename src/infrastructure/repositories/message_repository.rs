//! Message Repository Implementation
//!
//! PostgreSQL implementation of message storage with viewer-aware room
//! history, direct conversations and the retention sweep.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{Message, MessageRepository, MessageType, NewMessage};
use crate::shared::error::AppError;

/// PostgreSQL message repository implementation.
pub struct PgMessageRepository {
    pool: PgPool,
}

impl PgMessageRepository {
    /// Creates a new PgMessageRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const MESSAGE_COLUMNS: &str = r#"
    id, sender_id, receiver_id, room_id, content,
    message_type::text AS message_type, mentions, is_private,
    is_hidden, hidden_reason, read_at, created_at
"#;

/// Internal row type for message queries.
#[derive(Debug, sqlx::FromRow)]
struct MessageRow {
    id: Uuid,
    sender_id: Uuid,
    receiver_id: Option<Uuid>,
    room_id: Option<Uuid>,
    content: String,
    message_type: String, // PostgreSQL enum maps to string
    mentions: Vec<Uuid>,
    is_private: bool,
    is_hidden: bool,
    hidden_reason: Option<String>,
    read_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl MessageRow {
    fn into_message(self) -> Message {
        Message {
            id: self.id,
            sender_id: self.sender_id,
            receiver_id: self.receiver_id,
            room_id: self.room_id,
            content: self.content,
            message_type: MessageType::from_str(&self.message_type),
            mentions: self.mentions,
            is_private: self.is_private,
            is_hidden: self.is_hidden,
            hidden_reason: self.hidden_reason,
            read_at: self.read_at,
            created_at: self.created_at,
        }
    }
}

#[async_trait]
impl MessageRepository for PgMessageRepository {
    async fn create(&self, message: &NewMessage) -> Result<Message, AppError> {
        let row = sqlx::query_as::<_, MessageRow>(&format!(
            r#"
            INSERT INTO messages (
                id, sender_id, receiver_id, room_id, content, message_type,
                mentions, is_private, is_hidden, hidden_reason
            )
            VALUES ($1, $2, $3, $4, $5, $6::message_type, $7, $8, $9, $10)
            RETURNING {MESSAGE_COLUMNS}
            "#
        ))
        .bind(message.id)
        .bind(message.sender_id)
        .bind(message.receiver_id)
        .bind(message.room_id)
        .bind(&message.content)
        .bind(message.message_type.as_str())
        .bind(&message.mentions)
        .bind(message.is_private)
        .bind(message.is_hidden)
        .bind(&message.hidden_reason)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into_message())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Message>, AppError> {
        let row = sqlx::query_as::<_, MessageRow>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(MessageRow::into_message))
    }

    /// Fetches the newest `limit` rows, then flips them to ascending order.
    async fn find_room_history(
        &self,
        room_id: Uuid,
        viewer: Uuid,
        excluded_senders: &[Uuid],
        limit: i64,
    ) -> Result<Vec<Message>, AppError> {
        let rows = sqlx::query_as::<_, MessageRow>(&format!(
            r#"
            SELECT * FROM (
                SELECT {MESSAGE_COLUMNS}
                FROM messages
                WHERE room_id = $1
                  AND (is_private = FALSE OR sender_id = $2 OR receiver_id = $2)
                  AND NOT (sender_id = ANY($3))
                ORDER BY created_at DESC, id DESC
                LIMIT $4
            ) recent
            ORDER BY created_at ASC, id ASC
            "#
        ))
        .bind(room_id)
        .bind(viewer)
        .bind(excluded_senders)
        .bind(limit.clamp(1, 500))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(MessageRow::into_message).collect())
    }

    async fn find_conversation(
        &self,
        user_a: Uuid,
        user_b: Uuid,
        limit: i64,
    ) -> Result<Vec<Message>, AppError> {
        let rows = sqlx::query_as::<_, MessageRow>(&format!(
            r#"
            SELECT * FROM (
                SELECT {MESSAGE_COLUMNS}
                FROM messages
                WHERE room_id IS NULL
                  AND ((sender_id = $1 AND receiver_id = $2)
                    OR (sender_id = $2 AND receiver_id = $1))
                ORDER BY created_at DESC, id DESC
                LIMIT $3
            ) recent
            ORDER BY created_at ASC, id ASC
            "#
        ))
        .bind(user_a)
        .bind(user_b)
        .bind(limit.clamp(1, 500))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(MessageRow::into_message).collect())
    }

    async fn find_inbox(
        &self,
        user_id: Uuid,
        excluded_partners: &[Uuid],
    ) -> Result<Vec<Message>, AppError> {
        let rows = sqlx::query_as::<_, MessageRow>(&format!(
            r#"
            SELECT * FROM (
                SELECT DISTINCT ON (partner) {MESSAGE_COLUMNS}, partner
                FROM (
                    SELECT m.*,
                           CASE WHEN m.sender_id = $1 THEN m.receiver_id ELSE m.sender_id END AS partner
                    FROM messages m
                    WHERE m.room_id IS NULL
                      AND (m.sender_id = $1 OR m.receiver_id = $1)
                ) direct
                WHERE NOT (partner = ANY($2))
                ORDER BY partner, created_at DESC
            ) latest
            ORDER BY created_at DESC
            "#
        ))
        .bind(user_id)
        .bind(excluded_partners)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(MessageRow::into_message).collect())
    }

    async fn mark_read(&self, id: Uuid, reader: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE messages
            SET read_at = NOW()
            WHERE id = $1 AND receiver_id = $2 AND read_at IS NULL
            "#,
        )
        .bind(id)
        .bind(reader)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM messages WHERE created_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
