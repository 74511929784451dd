//! Send pipeline: fan-out, block filtering, acknowledgements, side effects.

use pretty_assertions::assert_eq;
use std::sync::atomic::Ordering;
use test_case::test_case;
use uuid::Uuid;

use chat_gateway::domain::{MessageType, NotificationKind};
use chat_gateway::presentation::websocket::{ContentKind, ErrorCode, ServerEvent};

use super::*;
use crate::common::*;

#[tokio::test]
async fn test_room_message_reaches_members_and_sender_once() {
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
        .send(&harness, room_message(room.id, "hello everyone", ContentKind::Text, Some("t-1")))
        .await;

    // Assert
    assert_eq!(names(&own), vec!["receivePublicMessage", "message_delivered"]);
    let copy = public_messages(&own)[0];
    assert_eq!(copy.content, "hello everyone");
    assert_eq!(copy.sender.id, alice.id);
    let ServerEvent::MessageDelivered { temp_id, message_id, .. } = &own[1] else {
        panic!("expected delivery ack");
    };
    assert_eq!(temp_id.as_deref(), Some("t-1"));
    assert_eq!(*message_id, copy.id);

    let received = member.drain();
    assert_eq!(public_messages(&received).len(), 1);
    assert_eq!(public_messages(&received)[0].id, copy.id);
}

#[tokio::test]
async fn test_room_broadcast_skips_members_who_blocked_sender() {
    // Arrange
    let harness = Harness::new();
    let room = harness.add_room("Lobby").await;
    let alice = harness.add_user("alice");
    let bob = harness.add_user("bob");
    let carol = harness.add_user("carol");
    harness.block(&alice, &bob);

    let mut blocker = harness.joined(&alice, &room).await;
    let mut sender = harness.joined(&bob, &room).await;
    let mut bystander = harness.joined(&carol, &room).await;
    blocker.drain();
    bystander.drain();

    // Act
    let own = sender.send(&harness, room_text(room.id, "hi room")).await;

    // Assert
    assert_eq!(count(&own, "message_delivered"), 1);
    assert!(public_messages(&blocker.drain()).is_empty());
    assert_eq!(public_messages(&bystander.drain()).len(), 1);
}

#[tokio::test]
async fn test_private_message_delivered_to_receiver_inbox() {
    // Arrange
    let harness = Harness::new();
    let alice = harness.add_user("alice");
    let bob = harness.add_user("bob");
    let mut sender = harness.connect(Some(&alice)).await;
    let mut receiver = harness.connect(Some(&bob)).await;
    sender.send(&harness, join_inbox(alice.id)).await;
    receiver.send(&harness, join_inbox(bob.id)).await;

    // Act
    let own = sender.send(&harness, direct(bob.id, "secret plans", Some("p-1"))).await;

    // Assert
    assert_eq!(names(&own), vec!["receiveMessage", "message_delivered"]);
    let inbound = receiver.drain();
    let received = private_messages(&inbound);
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].content, "secret plans");
    assert_eq!(received[0].message_type, "private");
    assert_eq!(received[0].receiver.as_ref().map(|r| r.id), Some(bob.id));

    let stored = harness.messages.all();
    assert_eq!(stored.len(), 1);
    assert_ne!(stored[0].content, "secret plans");
}

#[tokio::test]
async fn test_private_message_syncs_senders_other_tabs() {
    let harness = Harness::new();
    let alice = harness.add_user("alice");
    let bob = harness.add_user("bob");
    let mut tab1 = harness.connect(Some(&alice)).await;
    let mut tab2 = harness.connect(Some(&alice)).await;
    tab1.send(&harness, join_inbox(alice.id)).await;
    tab2.send(&harness, join_inbox(alice.id)).await;

    let own = tab1.send(&harness, direct(bob.id, "from tab one", None)).await;

    assert_eq!(private_messages(&own).len(), 1);
    assert_eq!(private_messages(&tab2.drain()).len(), 1);
}

#[tokio::test]
async fn test_private_message_to_blocker_is_rejected() {
    // Arrange
    let harness = Harness::new();
    let alice = harness.add_user("alice");
    let bob = harness.add_user("bob");
    harness.block(&bob, &alice);
    let mut sender = harness.connect(Some(&alice)).await;
    sender.drain();

    // Act
    let events = sender.send(&harness, direct(bob.id, "hello?", Some("p-2"))).await;

    // Assert
    assert_eq!(names(&events), vec!["delivery_failed", "error"]);
    assert_eq!(error_codes(&events), vec![ErrorCode::Blocked]);
    assert!(harness.messages.all().is_empty());
}

#[tokio::test]
async fn test_private_message_to_self_is_invalid() {
    let harness = Harness::new();
    let alice = harness.add_user("alice");
    let mut client = harness.connect(Some(&alice)).await;
    client.drain();

    let events = client.send(&harness, direct(alice.id, "me", None)).await;

    assert_eq!(error_codes(&events), vec![ErrorCode::InvalidPayload]);
}

#[tokio::test]
async fn test_private_message_to_unknown_user_is_not_found() {
    let harness = Harness::new();
    let alice = harness.add_user("alice");
    let mut client = harness.connect(Some(&alice)).await;
    client.drain();

    let events = client.send(&harness, direct(Uuid::new_v4(), "anyone", None)).await;

    assert_eq!(error_codes(&events), vec![ErrorCode::NotFound]);
}

#[tokio::test]
async fn test_blank_content_is_invalid() {
    let harness = Harness::new();
    let room = harness.add_room("Lobby").await;
    let alice = harness.add_user("alice");
    let mut client = harness.joined(&alice, &room).await;

    let events = client.send(&harness, room_text(room.id, "   ")).await;

    assert_eq!(error_codes(&events), vec![ErrorCode::InvalidPayload]);
    assert!(harness.messages.all().is_empty());
}

#[tokio::test]
async fn test_whisper_reaches_only_the_pair() {
    // Arrange
    let harness = Harness::new();
    let room = harness.add_room("Lobby").await;
    let alice = harness.add_user("alice");
    let bob = harness.add_user("bob");
    let carol = harness.add_user("carol");
    let mut sender = harness.joined(&alice, &room).await;
    let mut target = harness.joined(&bob, &room).await;
    let mut bystander = harness.joined(&carol, &room).await;
    sender.drain();
    target.drain();
    bystander.drain();

    // Act
    let own = sender.send(&harness, whisper(room.id, bob.id, "psst")).await;

    // Assert
    assert_eq!(public_messages(&own)[0].message_type, "whisper");
    let got = target.drain();
    assert_eq!(public_messages(&got).len(), 1);
    assert_eq!(public_messages(&got)[0].content, "psst");
    assert!(bystander.drain().is_empty());
    assert_eq!(harness.messages.all()[0].message_type, MessageType::Whisper);
}

#[test_case("hey @bob look", ContentKind::Text, MessageType::Mention ; "resolved mention")]
#[test_case("hey @BOB look", ContentKind::Text, MessageType::Mention ; "mention is case insensitive")]
#[test_case("hey @nobody look", ContentKind::Text, MessageType::Public ; "unresolved mention")]
#[test_case("cdn/pic @bob", ContentKind::Image, MessageType::Image ; "image wins over mention")]
#[tokio::test]
async fn test_room_message_classification(content: &str, kind: ContentKind, expected: MessageType) {
    let harness = Harness::new();
    let room = harness.add_room("Lobby").await;
    let alice = harness.add_user("alice");
    harness.add_user("bob");
    let mut client = harness.joined(&alice, &room).await;

    client
        .send(&harness, room_message(room.id, content, kind, None))
        .await;

    assert_eq!(harness.messages.all()[0].message_type, expected);
}

#[tokio::test]
async fn test_mention_notifies_unless_mentioned_user_blocked_sender() {
    // Arrange
    let harness = Harness::new();
    let room = harness.add_room("Lobby").await;
    let alice = harness.add_user("alice");
    let bob = harness.add_user("bob");
    let carol = harness.add_user("carol");
    harness.block(&carol, &alice);
    let mut client = harness.joined(&alice, &room).await;

    // Act
    client
        .send(&harness, room_text(room.id, "@bob and @carol come here"))
        .await;
    settle().await;

    // Assert
    let stored = &harness.messages.all()[0];
    assert_eq!(stored.mentions.len(), 2);
    let bob_notes = harness.notifications.for_user(bob.id);
    assert_eq!(bob_notes.len(), 1);
    assert_eq!(bob_notes[0].kind, NotificationKind::Mention);
    assert!(harness.notifications.for_user(carol.id).is_empty());
}

#[tokio::test]
async fn test_read_receipt_notifies_sender_once() {
    // Arrange
    let harness = Harness::new();
    let alice = harness.add_user("alice");
    let bob = harness.add_user("bob");
    let mut sender = harness.connect(Some(&alice)).await;
    let mut reader = harness.connect(Some(&bob)).await;
    sender.send(&harness, join_inbox(alice.id)).await;
    sender.send(&harness, direct(bob.id, "did you see this", None)).await;
    let message_id = harness.messages.all()[0].id;
    reader.drain();

    // Act
    reader.send(&harness, read_receipt(message_id)).await;
    let first = sender.drain();
    reader.send(&harness, read_receipt(message_id)).await;
    let second = sender.drain();

    // Assert
    let [ServerEvent::MessageRead { message_id: read, reader_id, .. }] = first.as_slice() else {
        panic!("expected one read receipt, got {:?}", first);
    };
    assert_eq!(*read, message_id);
    assert_eq!(*reader_id, bob.id);
    assert!(second.is_empty());
    assert!(harness.messages.all()[0].read_at.is_some());
}

#[tokio::test]
async fn test_read_receipt_by_sender_is_ignored() {
    let harness = Harness::new();
    let alice = harness.add_user("alice");
    let bob = harness.add_user("bob");
    let mut sender = harness.connect(Some(&alice)).await;
    sender.send(&harness, direct(bob.id, "note to bob", None)).await;
    let message_id = harness.messages.all()[0].id;

    let events = sender.send(&harness, read_receipt(message_id)).await;

    assert!(events.is_empty());
    assert!(harness.messages.all()[0].read_at.is_none());
}

#[tokio::test]
async fn test_store_failure_reports_delivery_failed_only() {
    // Arrange
    let harness = Harness::new();
    let room = harness.add_room("Lobby").await;
    let alice = harness.add_user("alice");
    let bob = harness.add_user("bob");
    let mut sender = harness.joined(&alice, &room).await;
    let mut member = harness.joined(&bob, &room).await;
    sender.drain();
    harness.messages.fail_writes.store(true, Ordering::SeqCst);

    // Act
    let events = sender
        .send(&harness, room_message(room.id, "will not land", ContentKind::Text, Some("t-9")))
        .await;

    // Assert
    let [ServerEvent::DeliveryFailed { temp_id, .. }] = events.as_slice() else {
        panic!("expected delivery_failed only, got {:?}", events);
    };
    assert_eq!(temp_id.as_deref(), Some("t-9"));
    assert!(member.drain().is_empty());
}

#[tokio::test]
async fn test_accepted_message_scores_and_awards_first_badge() {
    let harness = Harness::new();
    let room = harness.add_room("Lobby").await;
    let alice = harness.add_user("alice");
    let mut client = harness.joined(&alice, &room).await;

    client.send(&harness, room_text(room.id, "first post")).await;
    settle().await;

    assert_eq!(harness.scores.total(alice.id), 1);
    let notes = harness.notifications.for_user(alice.id);
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].kind, NotificationKind::Badge);
}

#[tokio::test]
async fn test_anonymous_send_is_rejected() {
    let harness = Harness::new();
    let room = harness.add_room("Lobby").await;
    let mut client = harness.connect(None).await;
    client.drain();

    let events = client
        .send(&harness, room_message(room.id, "hi", ContentKind::Text, Some("a-1")))
        .await;

    assert_eq!(names(&events), vec!["delivery_failed", "error"]);
    assert_eq!(error_codes(&events), vec![ErrorCode::Unauthenticated]);
}

#[tokio::test]
async fn test_room_sends_require_joining_the_room() {
    // Arrange
    let harness = Harness::new();
    let room = harness.add_room("Lobby").await;
    let alice = harness.add_user("alice");
    let bob = harness.add_user("bob");
    let carol = harness.add_user("carol");
    let mut member = harness.joined(&bob, &room).await;
    let mut leaver = harness.joined(&alice, &room).await;
    leaver.send(&harness, leave_public(room.id)).await;
    let mut outsider = harness.connect(Some(&carol)).await;
    outsider.drain();
    member.drain();

    // Act
    let after_leave = leaver
        .send(&harness, room_message(room.id, "still here?", ContentKind::Text, Some("l-1")))
        .await;
    let never_joined = outsider.send(&harness, whisper(room.id, bob.id, "psst")).await;

    // Assert
    assert_eq!(names(&after_leave), vec!["delivery_failed", "error"]);
    assert_eq!(error_codes(&after_leave), vec![ErrorCode::Forbidden]);
    assert_eq!(error_codes(&never_joined), vec![ErrorCode::Forbidden]);
    assert!(member.drain().is_empty());
    assert!(harness.messages.all().is_empty());
}
