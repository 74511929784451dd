//! Scoring Service
//!
//! Points and badges per accepted message. Side effects only; callers never
//! wait on it and failures are logged.

use std::sync::Arc;

use uuid::Uuid;

use crate::config::ScoringSettings;
use crate::domain::{Badge, MessageType, Notification, NotificationKind, NotificationSink, ScoreRepository};
use crate::shared::error::AppError;

pub struct ScoringService {
    scores: Arc<dyn ScoreRepository>,
    notifications: Arc<dyn NotificationSink>,
    table: ScoringSettings,
}

impl ScoringService {
    pub fn new(
        scores: Arc<dyn ScoreRepository>,
        notifications: Arc<dyn NotificationSink>,
        table: ScoringSettings,
    ) -> Self {
        Self {
            scores,
            notifications,
            table,
        }
    }

    pub fn points_for(&self, message_type: MessageType) -> i64 {
        match message_type {
            MessageType::Public => self.table.public_points,
            MessageType::Mention => self.table.mention_points,
            MessageType::Image => self.table.image_points,
            MessageType::Private => self.table.private_points,
            MessageType::Whisper => self.table.whisper_points,
            MessageType::Join | MessageType::Welcome => 0,
        }
    }

    /// Add points and award any newly earned badge. Returns the new total.
    pub async fn score(&self, user_id: Uuid, message_type: MessageType) -> Result<i64, AppError> {
        let points = self.points_for(message_type);
        if points <= 0 {
            return Ok(0);
        }

        let total = self.scores.add_points(user_id, points).await?;
        for badge in Badge::earned_at(total) {
            if self.scores.award_badge(user_id, badge).await? {
                tracing::info!(user_id = %user_id, badge = badge.as_str(), "Badge earned");
                let notification = Notification::new(
                    user_id,
                    NotificationKind::Badge,
                    format!("New badge: {}", badge.title()),
                    format!("You now have {} points.", total),
                );
                if let Err(e) = self.notifications.notify(notification).await {
                    tracing::warn!(user_id = %user_id, error = %e, "Failed to send badge notification");
                }
            }
        }
        Ok(total)
    }

    /// Fire-and-forget scoring.
    pub fn spawn_score(self: &Arc<Self>, user_id: Uuid, message_type: MessageType) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = this.score(user_id, message_type).await {
                tracing::warn!(user_id = %user_id, error = %e, "Scoring failed");
            }
        });
    }
}
