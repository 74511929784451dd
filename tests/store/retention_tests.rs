//! Retention sweep.

use chrono::{Duration, Utc};
use uuid::Uuid;

use chat_gateway::domain::{Message, MessageType};

use crate::common::*;

fn aged(sender: Uuid, room: Uuid, days: i64) -> Message {
    Message {
        id: Uuid::now_v7(),
        sender_id: sender,
        receiver_id: None,
        room_id: Some(room),
        content: format!("{} days old", days),
        message_type: MessageType::Public,
        mentions: Vec::new(),
        is_private: false,
        is_hidden: false,
        hidden_reason: None,
        read_at: None,
        created_at: Utc::now() - Duration::days(days),
    }
}

#[tokio::test]
async fn test_purge_removes_only_expired_messages() {
    // Arrange
    let harness = Harness::new();
    let room = harness.add_room("Archive").await;
    let alice = harness.add_user("alice");
    for days in [45, 31, 29, 1] {
        harness.messages.insert_raw(aged(alice.id, room.id, days));
    }

    // Act
    let removed = harness
        .state
        .messages
        .purge_older_than(harness.settings.retention.message_days)
        .await
        .unwrap();

    // Assert
    assert_eq!(removed, 2);
    let left: Vec<String> = harness.messages.all().into_iter().map(|m| m.content).collect();
    assert_eq!(left, vec!["29 days old".to_string(), "1 days old".to_string()]);
}

#[tokio::test]
async fn test_purge_with_nothing_expired_is_a_no_op() {
    let harness = Harness::new();
    let room = harness.add_room("Fresh").await;
    let alice = harness.add_user("alice");
    harness.messages.insert_raw(aged(alice.id, room.id, 0));

    let removed = harness.state.messages.purge_older_than(30).await.unwrap();

    assert_eq!(removed, 0);
    assert_eq!(harness.messages.all().len(), 1);
}
