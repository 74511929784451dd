//! Moderation Service
//!
//! Classifiers plus the violation handler. Classification is pure; the
//! handler writes the durable mute, mirrors it into the presence store,
//! notifies the user and records an audit entry.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::ModerationSettings;
use crate::domain::services::{contains_links_or_socials, spam_fingerprint, Blocklist};
use crate::domain::{
    AuditActor, AuditEntry, AuditLog, Notification, NotificationKind, NotificationSink,
    UserRepository,
};
use crate::infrastructure::cache::{keys, PresenceStore};
use crate::infrastructure::metrics;
use crate::shared::error::AppError;

/// Why a user was muted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationReason {
    Spam,
    LinkSharing,
    Profanity,
}

impl ViolationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Spam => "spam",
            Self::LinkSharing => "link_sharing",
            Self::Profanity => "profanity",
        }
    }

    /// User-facing description.
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Spam => "sending the same message repeatedly",
            Self::LinkSharing => "sharing links or social media handles",
            Self::Profanity => "using inappropriate language",
        }
    }
}

/// Outcome of a violation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MuteRecord {
    pub user_id: Uuid,
    pub reason: ViolationReason,
    pub muted_until: DateTime<Utc>,
    pub duration_minutes: i64,
}

/// Moderation engine.
pub struct ModerationService {
    presence: Arc<dyn PresenceStore>,
    users: Arc<dyn UserRepository>,
    notifications: Arc<dyn NotificationSink>,
    audit: Arc<dyn AuditLog>,
    blocklist: RwLock<Arc<Blocklist>>,
    policy: ModerationSettings,
}

impl ModerationService {
    pub fn new(
        presence: Arc<dyn PresenceStore>,
        users: Arc<dyn UserRepository>,
        notifications: Arc<dyn NotificationSink>,
        audit: Arc<dyn AuditLog>,
        policy: ModerationSettings,
    ) -> Self {
        let blocklist = Blocklist::new(policy.blocklist.iter());
        Self {
            presence,
            users,
            notifications,
            audit,
            blocklist: RwLock::new(Arc::new(blocklist)),
            policy,
        }
    }

    pub fn contains_profanity(&self, text: &str) -> bool {
        let blocklist = self.blocklist.read().clone();
        blocklist.contains_profanity(text)
    }

    pub fn contains_links_or_socials(&self, text: &str) -> bool {
        contains_links_or_socials(text)
    }

    /// Swap in a new blocklist. In-flight checks keep the list they started with.
    pub fn reload_blocklist<I, S>(&self, terms: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let next = Arc::new(Blocklist::new(terms));
        let len = next.len();
        *self.blocklist.write() = next;
        tracing::info!(terms = len, "Blocklist reloaded");
        len
    }

    /// Count this content for the user and report whether the window
    /// threshold has been reached.
    pub async fn check_spam(&self, user_id: Uuid, text: &str) -> Result<bool, AppError> {
        let fingerprint = spam_fingerprint(text, self.policy.fingerprint_len);
        let key = keys::spam(user_id, &fingerprint);
        let count = self
            .presence
            .increment_window(&key, self.policy.spam_window_secs)
            .await?;

        Ok(count >= self.policy.spam_threshold)
    }

    /// Default mute length for a reason.
    pub fn mute_minutes_for(&self, reason: ViolationReason) -> i64 {
        match reason {
            ViolationReason::Spam => self.policy.spam_mute_minutes,
            ViolationReason::LinkSharing | ViolationReason::Profanity => {
                self.policy.violation_mute_minutes
            }
        }
    }

    /// Mute a user. The durable record must be written; mirror, notification
    /// and audit failures are logged and swallowed. Concurrent calls are safe:
    /// the last expiry written wins.
    #[tracing::instrument(skip(self), fields(reason = reason.as_str()))]
    pub async fn handle_violation(
        &self,
        user_id: Uuid,
        reason: ViolationReason,
        duration_minutes: i64,
    ) -> Result<MuteRecord, AppError> {
        let duration_minutes = duration_minutes.max(1);
        let muted_until = Utc::now() + Duration::minutes(duration_minutes);

        self.users
            .set_mute(user_id, muted_until, reason.as_str())
            .await?;

        let seconds = (duration_minutes as u64).saturating_mul(60);
        if let Err(e) = self.presence.mute(user_id, seconds).await {
            tracing::warn!(user_id = %user_id, error = %e, "Failed to mirror mute into presence store");
        }

        let notification = Notification::new(
            user_id,
            NotificationKind::Moderation,
            "You have been muted",
            format!(
                "You were muted for {} minute(s) for {}.",
                duration_minutes,
                reason.describe()
            ),
        );
        if let Err(e) = self.notifications.notify(notification).await {
            tracing::warn!(user_id = %user_id, error = %e, "Failed to send mute notification");
        }

        let entry = AuditEntry {
            actor: AuditActor::auto_moderator(),
            action: "mute".to_string(),
            target_user: Some(user_id),
            reason: reason.as_str().to_string(),
            metadata: serde_json::json!({
                "duration_minutes": duration_minutes,
                "muted_until": muted_until,
            }),
            created_at: Utc::now(),
        };
        if let Err(e) = self.audit.record(entry).await {
            tracing::warn!(user_id = %user_id, error = %e, "Failed to write audit entry");
        }

        metrics::record_moderation_action(reason.as_str());
        tracing::info!(user_id = %user_id, duration_minutes, "User muted");

        Ok(MuteRecord {
            user_id,
            reason,
            muted_until,
            duration_minutes,
        })
    }

    /// Read the durable mute. A lapsed record is cleared from both the
    /// durable store and the presence mirror.
    pub async fn check_mute_status(&self, user_id: Uuid) -> Result<bool, AppError> {
        let Some(user) = self.users.find_by_id(user_id).await? else {
            return Ok(false);
        };
        let Some(until) = user.muted_until else {
            return Ok(false);
        };

        let now = Utc::now();
        if user.is_muted_at(now) {
            // Restore a mirror lost with a presence restart.
            let remaining = (until - now).num_seconds().max(1) as u64;
            if let Err(e) = self.presence.mute(user_id, remaining).await {
                tracing::debug!(user_id = %user_id, error = %e, "Failed to restore mute mirror");
            }
            return Ok(true);
        }

        self.users.clear_mute(user_id).await?;
        self.presence.unmute(user_id).await?;
        tracing::debug!(user_id = %user_id, "Cleared lapsed mute");
        Ok(false)
    }

    /// Presence fast path, then the self-healing durable check. Store errors
    /// read as not muted.
    pub async fn is_muted(&self, user_id: Uuid) -> bool {
        match self.presence.is_muted(user_id).await {
            Ok(true) => return true,
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "Presence mute check failed");
                metrics::record_persistence_failure("presence");
            }
        }

        match self.check_mute_status(user_id).await {
            Ok(muted) => muted,
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "Durable mute check failed, allowing");
                false
            }
        }
    }
}
