use branch_core::{Conversation, ConversationId, Message, MessageId, MessageStatus, Role};
use branch_store::{ConversationStore, MessageStore, SqliteBranchStore, StoreError};
use chrono::{DateTime, Duration, TimeZone, Utc};
use tempfile::tempdir;

fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 14, 8, 0, 0)
        .single()
        .expect("valid datetime")
}

async fn store_with_conversation(dir: &std::path::Path) -> (SqliteBranchStore, Conversation) {
    let store = SqliteBranchStore::new(dir.join("nested").join("branches.db"));
    store.init().await.expect("init");
    let conversation = Conversation::new("alice");
    store
        .create_conversation(&conversation)
        .await
        .expect("create conversation");
    (store, conversation)
}

fn message(
    conversation: &Conversation,
    id: &str,
    parent: Option<&str>,
    offset_ms: i64,
) -> Message {
    Message::new(
        conversation.id.clone(),
        parent.map(MessageId::from),
        Role::User,
        format!("content {id}"),
        base() + Duration::milliseconds(offset_ms),
    )
    .with_id(id)
}

#[tokio::test]
async fn init_is_idempotent() {
    let dir = tempdir().expect("tempdir");
    let store = SqliteBranchStore::new(dir.path().join("branches.db"));
    store.init().await.expect("first init");
    store.init().await.expect("second init");
}

#[tokio::test]
async fn messages_round_trip_in_creation_order() {
    let dir = tempdir().expect("tempdir");
    let (store, conversation) = store_with_conversation(dir.path()).await;

    // Inserted out of order on purpose; 1000ms vs 20ms would misorder as text
    // with variable-width fractional seconds.
    let root = message(&conversation, "root", None, 0);
    let late = message(&conversation, "late", Some("root"), 1000);
    let early = message(&conversation, "early", Some("root"), 20);
    for m in [&root, &late, &early] {
        store.insert_message(m).await.expect("insert");
    }

    let listed = store
        .list_messages(&conversation.id)
        .await
        .expect("list");
    let ids: Vec<&str> = listed.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["root", "early", "late"]);
    assert_eq!(listed[2], late);

    let fetched = store
        .get_message(&MessageId::from("early"))
        .await
        .expect("get")
        .expect("present");
    assert_eq!(fetched, early);
}

#[tokio::test]
async fn duplicate_and_unknown_conversation_are_rejected() {
    let dir = tempdir().expect("tempdir");
    let (store, conversation) = store_with_conversation(dir.path()).await;

    let root = message(&conversation, "root", None, 0);
    store.insert_message(&root).await.expect("insert");

    let err = store.insert_message(&root).await.unwrap_err();
    assert!(matches!(err, StoreError::DuplicateMessage(id) if id.as_str() == "root"));

    let stray = Message::new(
        ConversationId::new("missing"),
        None,
        Role::User,
        "lost",
        base(),
    );
    let err = store.insert_message(&stray).await.unwrap_err();
    assert!(matches!(err, StoreError::ConversationNotFound(_)));
    assert_eq!(store.revision(&conversation.id).await.expect("revision"), 1);
}

#[tokio::test]
async fn status_change_bumps_revision_and_persists() {
    let dir = tempdir().expect("tempdir");
    let (store, conversation) = store_with_conversation(dir.path()).await;

    let root = message(&conversation, "root", None, 0);
    store.insert_message(&root).await.expect("insert");
    store
        .update_status(&root.id, MessageStatus::Deleted)
        .await
        .expect("update");

    assert_eq!(store.revision(&conversation.id).await.expect("revision"), 2);
    let stored = store
        .get_message(&root.id)
        .await
        .expect("get")
        .expect("present");
    assert_eq!(stored.status, MessageStatus::Deleted);

    let err = store
        .update_status(&MessageId::from("ghost"), MessageStatus::Deleted)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::MessageNotFound(_)));
}

#[tokio::test]
async fn pointer_and_owner_listing() {
    let dir = tempdir().expect("tempdir");
    let (store, conversation) = store_with_conversation(dir.path()).await;
    let other = Conversation::new("bob");
    store.create_conversation(&other).await.expect("create");

    let root = message(&conversation, "root", None, 0);
    store.insert_message(&root).await.expect("insert");
    store
        .set_current_message(&conversation.id, Some(&root.id))
        .await
        .expect("set pointer");

    let loaded = store
        .get_conversation(&conversation.id)
        .await
        .expect("get")
        .expect("present");
    assert_eq!(loaded.current_message_id, Some(root.id.clone()));

    let owned = store.list_conversations("alice").await.expect("list");
    assert_eq!(owned.len(), 1);
    assert_eq!(owned[0].id, conversation.id);

    let err = store
        .set_current_message(&ConversationId::new("missing"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::ConversationNotFound(_)));
}

#[tokio::test]
async fn append_inserts_and_moves_pointer_atomically() {
    let dir = tempdir().expect("tempdir");
    let (store, conversation) = store_with_conversation(dir.path()).await;

    let root = message(&conversation, "root", None, 0);
    store.append_message(&root).await.expect("append");
    let loaded = store
        .get_conversation(&conversation.id)
        .await
        .expect("get")
        .expect("present");
    assert_eq!(loaded.current_message_id, Some(root.id.clone()));

    let reply = message(&conversation, "reply", Some("root"), 10);
    store.append_message(&reply).await.expect("append");

    // A failed append leaves both the messages and the pointer untouched.
    let err = store.append_message(&root).await.unwrap_err();
    assert!(matches!(err, StoreError::DuplicateMessage(_)));
    let loaded = store
        .get_conversation(&conversation.id)
        .await
        .expect("get")
        .expect("present");
    assert_eq!(loaded.current_message_id, Some(reply.id.clone()));
    assert_eq!(store.revision(&conversation.id).await.expect("revision"), 2);
    assert_eq!(
        store.list_messages(&conversation.id).await.expect("list").len(),
        2
    );
}
