//! Gamification score and badges.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shared::error::AppError;

/// Badges a user can earn by chatting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Badge {
    FirstMessage,
    Regular,
    Veteran,
}

impl Badge {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FirstMessage => "first_message",
            Self::Regular => "regular",
            Self::Veteran => "veteran",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::FirstMessage => "First words",
            Self::Regular => "Regular",
            Self::Veteran => "Veteran",
        }
    }

    /// Badges earned by a total of `points`, lowest first.
    pub fn earned_at(points: i64) -> Vec<Badge> {
        let mut badges = Vec::new();
        if points > 0 {
            badges.push(Badge::FirstMessage);
        }
        if points >= 100 {
            badges.push(Badge::Regular);
        }
        if points >= 1000 {
            badges.push(Badge::Veteran);
        }
        badges
    }
}

/// Storage for points and badges.
#[async_trait]
pub trait ScoreRepository: Send + Sync {
    /// Add points and return the new total.
    async fn add_points(&self, user_id: Uuid, points: i64) -> Result<i64, AppError>;

    /// Award a badge. Returns true when the badge is new.
    async fn award_badge(&self, user_id: Uuid, badge: Badge) -> Result<bool, AppError>;
}
