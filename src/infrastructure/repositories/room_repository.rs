//! Room Repository Implementation
//!
//! PostgreSQL implementation of room metadata with soft deletion.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{NewRoom, Room, RoomRepository, RoomType};
use crate::shared::error::AppError;

#[derive(Debug, sqlx::FromRow)]
struct RoomRow {
    id: Uuid,
    name: Option<String>,
    room_type: String,
    is_active: bool,
    is_deleted: bool,
    deleted_at: Option<DateTime<Utc>>,
    deleted_by: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl RoomRow {
    fn into_room(self) -> Room {
        Room {
            id: self.id,
            name: self.name,
            room_type: RoomType::from_str(&self.room_type),
            is_active: self.is_active,
            is_deleted: self.is_deleted,
            deleted_at: self.deleted_at,
            deleted_by: self.deleted_by,
            created_at: self.created_at,
        }
    }
}

/// PostgreSQL room repository implementation.
#[derive(Clone)]
pub struct PgRoomRepository {
    pool: PgPool,
}

impl PgRoomRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoomRepository for PgRoomRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Room>, AppError> {
        let row = sqlx::query_as::<_, RoomRow>(
            r#"
            SELECT id, name, room_type, is_active, is_deleted,
                   deleted_at, deleted_by, created_at
            FROM rooms
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_room()))
    }

    async fn list_active(&self) -> Result<Vec<Room>, AppError> {
        let rows = sqlx::query_as::<_, RoomRow>(
            r#"
            SELECT id, name, room_type, is_active, is_deleted,
                   deleted_at, deleted_by, created_at
            FROM rooms
            WHERE is_active = TRUE AND is_deleted = FALSE
            ORDER BY created_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_room()).collect())
    }

    async fn create(&self, room: &NewRoom) -> Result<Room, AppError> {
        let row = sqlx::query_as::<_, RoomRow>(
            r#"
            INSERT INTO rooms (id, name, room_type)
            VALUES ($1, $2, $3)
            RETURNING id, name, room_type, is_active, is_deleted,
                      deleted_at, deleted_by, created_at
            "#,
        )
        .bind(room.id)
        .bind(&room.name)
        .bind(room.room_type.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into_room())
    }

    async fn soft_delete(&self, id: Uuid, actor: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE rooms
            SET is_deleted = TRUE, is_active = FALSE,
                deleted_at = NOW(), deleted_by = $2
            WHERE id = $1 AND is_deleted = FALSE
            "#,
        )
        .bind(id)
        .bind(actor)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
