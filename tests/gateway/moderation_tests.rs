//! Moderation pipeline as seen from a connection.

use chrono::{Duration, Utc};
use pretty_assertions::assert_eq;

use chat_gateway::application::services::ViolationReason;
use chat_gateway::domain::{AuditActor, MessageType, NotificationKind, UserRepository, HIDDEN_MESSAGE_PLACEHOLDER};
use chat_gateway::infrastructure::cache::PresenceStore;
use chat_gateway::presentation::websocket::{ContentKind, ErrorCode, ServerEvent};

use super::*;
use crate::common::*;

#[tokio::test]
async fn test_fifth_identical_message_trips_spam_and_mute_blocks_the_next() {
    // Arrange
    let harness = Harness::new();
    let room = harness.add_room("Lobby").await;
    let alice = harness.add_user("alice");
    let mut client = harness.joined(&alice, &room).await;

    // Act
    for _ in 0..4 {
        let accepted = client.send(&harness, room_text(room.id, "buy my stuff")).await;
        assert_eq!(count(&accepted, "message_delivered"), 1);
    }
    let fifth = client.send(&harness, room_text(room.id, "buy my stuff")).await;
    let sixth = client.send(&harness, room_text(room.id, "something different")).await;

    // Assert
    assert_eq!(names(&fifth), vec!["delivery_failed", "error", "user_muted"]);
    assert_eq!(error_codes(&fifth), vec![ErrorCode::SpamDetected]);
    let Some(ServerEvent::UserMuted { reason, duration_minutes, .. }) = fifth.last() else {
        panic!("expected user_muted");
    };
    assert_eq!(*reason, ViolationReason::Spam);
    assert_eq!(*duration_minutes, 1);

    assert_eq!(error_codes(&sixth), vec![ErrorCode::Muted]);
    assert_eq!(harness.messages.all().len(), 4);
    assert!(harness.presence.is_muted(alice.id).await.unwrap());
}

#[tokio::test]
async fn test_spam_mute_is_audited_and_notified() {
    let harness = Harness::new();
    let room = harness.add_room("Lobby").await;
    let alice = harness.add_user("alice");
    let mut client = harness.joined(&alice, &room).await;

    for _ in 0..5 {
        client.send(&harness, room_text(room.id, "again and again")).await;
    }
    settle().await;

    let audit = harness.audit.entries();
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].actor, AuditActor::auto_moderator());
    assert_eq!(audit[0].action, "mute");
    assert_eq!(audit[0].reason, "spam");
    assert_eq!(audit[0].target_user, Some(alice.id));

    let moderation: Vec<_> = harness
        .notifications
        .for_user(alice.id)
        .into_iter()
        .filter(|n| n.kind == NotificationKind::Moderation)
        .collect();
    assert_eq!(moderation.len(), 1);
}

#[tokio::test]
async fn test_link_is_redacted_persisted_and_broadcast() {
    // Arrange
    let harness = Harness::new();
    let room = harness.add_room("Lobby").await;
    let alice = harness.add_user("alice");
    let bob = harness.add_user("bob");
    let mut sender = harness.joined(&alice, &room).await;
    let mut member = harness.joined(&bob, &room).await;
    sender.drain();

    // Act
    let own = sender
        .send(&harness, room_text(room.id, "check www.example.com @bob"))
        .await;

    // Assert
    assert_eq!(
        names(&own),
        vec!["receivePublicMessage", "message_delivered", "warning", "user_muted"]
    );
    let Some(ServerEvent::UserMuted { reason, duration_minutes, .. }) = own.last() else {
        panic!("expected user_muted");
    };
    assert_eq!(*reason, ViolationReason::LinkSharing);
    assert_eq!(*duration_minutes, 1440);

    let received = member.drain();
    let redacted = public_messages(&received);
    assert_eq!(redacted.len(), 1);
    assert!(redacted[0].is_hidden);
    assert_eq!(redacted[0].content, HIDDEN_MESSAGE_PLACEHOLDER);

    let stored = &harness.messages.all()[0];
    assert!(stored.is_hidden);
    assert_eq!(stored.hidden_reason.as_deref(), Some("link_sharing"));
    assert_eq!(stored.message_type, MessageType::Public);
    assert!(stored.mentions.is_empty());

    let history = harness.state.messages.room_messages(room.id, bob.id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].content, HIDDEN_MESSAGE_PLACEHOLDER);

    let muted_until = harness.users.get(alice.id).unwrap().muted_until.unwrap();
    assert!(muted_until > Utc::now() + Duration::minutes(1430));
}

#[tokio::test]
async fn test_profanity_is_rejected_without_broadcast() {
    // Arrange
    let harness = Harness::new();
    let room = harness.add_room("Lobby").await;
    let alice = harness.add_user("alice");
    let bob = harness.add_user("bob");
    let mut sender = harness.joined(&alice, &room).await;
    let mut member = harness.joined(&bob, &room).await;
    sender.drain();
    member.drain();

    // Act
    let events = sender
        .send(&harness, room_message(room.id, "you BASTARD", ContentKind::Text, Some("x-1")))
        .await;

    // Assert
    assert_eq!(names(&events), vec!["delivery_failed", "error", "user_muted"]);
    assert_eq!(error_codes(&events), vec![ErrorCode::ProfanityDetected]);
    assert!(harness.messages.all().is_empty());
    assert!(member.drain().is_empty());
    assert_eq!(
        harness.users.get(alice.id).unwrap().mute_reason.as_deref(),
        Some("profanity")
    );
}

#[tokio::test]
async fn test_guest_cannot_send_images() {
    let harness = Harness::new();
    let room = harness.add_room("Lobby").await;
    let guest = harness.add_guest("visitor");
    let mut client = harness.joined(&guest, &room).await;

    let image = client
        .send(&harness, room_message(room.id, "cdn/cat", ContentKind::Image, None))
        .await;
    let text = client.send(&harness, room_text(room.id, "just words")).await;

    assert_eq!(error_codes(&image), vec![ErrorCode::GuestMediaRestricted]);
    assert_eq!(count(&text, "message_delivered"), 1);
}

#[tokio::test]
async fn test_durable_mute_blocks_without_presence_mirror() {
    let harness = Harness::new();
    let room = harness.add_room("Lobby").await;
    let alice = harness.add_user("alice");
    harness
        .users
        .set_mute(alice.id, Utc::now() + Duration::minutes(10), "profanity")
        .await
        .unwrap();
    let mut client = harness.joined(&alice, &room).await;

    let events = client.send(&harness, room_text(room.id, "let me talk")).await;

    assert_eq!(error_codes(&events), vec![ErrorCode::Muted]);
    assert!(harness.presence.is_muted(alice.id).await.unwrap());
}

#[tokio::test]
async fn test_lapsed_mute_self_heals() {
    let harness = Harness::new();
    let room = harness.add_room("Lobby").await;
    let alice = harness.add_user("alice");
    harness
        .users
        .set_mute(alice.id, Utc::now() - Duration::minutes(1), "spam")
        .await
        .unwrap();
    let mut client = harness.joined(&alice, &room).await;

    let events = client.send(&harness, room_text(room.id, "back again")).await;

    assert_eq!(count(&events, "message_delivered"), 1);
    assert!(harness.users.get(alice.id).unwrap().muted_until.is_none());
}
