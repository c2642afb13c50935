use std::sync::Arc;

use branch_core::{BranchError, ConversationId, MessageId, MessageStatus, Role};
use branch_service::{
    BranchService, BranchServiceConfig, CallerContext, HistoryView, ServiceError,
};
use branch_store::{
    BranchEvent, EventLog, InMemoryBranchStore, JsonlEventLog, MessageStore, NoopEventLog,
    SqliteBranchStore,
};
use tempfile::tempdir;

fn alice() -> CallerContext {
    CallerContext::new("alice")
}

fn service() -> BranchService {
    BranchService::with_store(Arc::new(InMemoryBranchStore::new()))
}

fn id_strs(path: &[MessageId]) -> Vec<&str> {
    path.iter().map(MessageId::as_str).collect()
}

fn contents(messages: &[branch_core::Message]) -> Vec<&str> {
    messages.iter().map(|m| m.content.as_str()).collect()
}

/// user "hello" -> assistant "hi there" -> user "how are you" -> assistant "fine"
async fn linear_conversation(service: &BranchService) -> (ConversationId, Vec<MessageId>) {
    let caller = alice();
    let conversation = service.create_conversation(&caller).await.unwrap();
    let mut ids = Vec::new();

    let first = service.send(&caller, &conversation.id, None, "hello").await.unwrap();
    ids.push(first.message.id.clone());
    let reply = service
        .commit_reply(&caller, &conversation.id, &first.message.id, "hi there")
        .await
        .unwrap();
    ids.push(reply.id.clone());
    let second = service
        .send(&caller, &conversation.id, None, "how are you")
        .await
        .unwrap();
    ids.push(second.message.id.clone());
    let reply = service
        .commit_reply(&caller, &conversation.id, &second.message.id, "fine")
        .await
        .unwrap();
    ids.push(reply.id.clone());

    (conversation.id, ids)
}

#[tokio::test]
async fn send_continues_from_pointer_and_assembles_path_context() {
    let service = service();
    let caller = alice();
    let (conversation_id, ids) = linear_conversation(&service).await;

    let outcome = service
        .send(&caller, &conversation_id, None, "and then?")
        .await
        .unwrap();
    assert_eq!(outcome.message.parent_id.as_ref(), Some(&ids[3]));
    assert_eq!(
        contents(&outcome.context),
        vec!["hello", "hi there", "how are you", "fine", "and then?"]
    );

    let history = service
        .get_history(&caller, &conversation_id, HistoryView::Tree)
        .await
        .unwrap();
    assert_eq!(history.current_message_id, Some(outcome.message.id.clone()));
    assert_eq!(history.active_path.leaf(), Some(&outcome.message.id));
}

#[tokio::test]
async fn edit_forks_a_sibling_and_keeps_the_original_subtree() {
    let service = service();
    let caller = alice();
    let (conversation_id, ids) = linear_conversation(&service).await;

    let edited = service
        .edit(&caller, &conversation_id, &ids[2], "how old are you")
        .await
        .unwrap();
    assert_eq!(edited.message.parent_id.as_ref(), Some(&ids[1]));
    assert_eq!(
        contents(&edited.context),
        vec!["hello", "hi there", "how old are you"]
    );

    let siblings = service.get_siblings(&caller, &edited.message.id).await.unwrap();
    assert_eq!(siblings.total, 2);
    assert_eq!(siblings.index, 1);
    assert_eq!(siblings.sibling_ids, vec![ids[2].clone(), edited.message.id.clone()]);

    let history = service
        .get_history(&caller, &conversation_id, HistoryView::Tree)
        .await
        .unwrap();
    assert_eq!(history.current_message_id, Some(edited.message.id.clone()));
    assert_eq!(history.nodes.len(), 5);

    let original = service
        .switch_branch(&caller, &conversation_id, &ids[2])
        .await
        .unwrap();
    assert_eq!(id_strs(original.ids()), id_strs(&ids));
}

#[tokio::test]
async fn edit_of_assistant_message_is_rejected() {
    let service = service();
    let (conversation_id, ids) = linear_conversation(&service).await;

    let error = service
        .edit(&alice(), &conversation_id, &ids[1], "rewrite")
        .await
        .unwrap_err();
    assert!(matches!(error, ServiceError::InvalidRequest(_)));
    assert!(error.is_recoverable());
}

#[tokio::test]
async fn regenerate_adds_a_sibling_reply() {
    let service = service();
    let caller = alice();
    let (conversation_id, ids) = linear_conversation(&service).await;

    let prepared = service
        .prepare_regenerate(&caller, &conversation_id, &ids[2])
        .await
        .unwrap();
    assert_eq!(
        contents(&prepared.context),
        vec!["hello", "hi there", "how are you"]
    );

    let alternative = service
        .commit_reply(&caller, &conversation_id, &ids[2], "great, thanks")
        .await
        .unwrap();
    let siblings = service.get_siblings(&caller, &ids[3]).await.unwrap();
    assert_eq!(siblings.sibling_ids, vec![ids[3].clone(), alternative.id.clone()]);

    let back = service
        .switch_sibling(&caller, &conversation_id, &alternative.id, -1)
        .await
        .unwrap();
    assert_eq!(back.leaf(), Some(&ids[3]));

    let clamped = service
        .switch_sibling(&caller, &conversation_id, &ids[3], 5)
        .await
        .unwrap();
    assert_eq!(clamped.leaf(), Some(&alternative.id));

    let history = service
        .get_history(&caller, &conversation_id, HistoryView::ActivePath)
        .await
        .unwrap();
    assert_eq!(history.current_message_id, Some(alternative.id.clone()));
    assert_eq!(history.nodes.len(), 4);
    assert_eq!(history.branch_points.len(), 1);
    assert_eq!(history.branch_points[0].message_id, alternative.id);
}

#[tokio::test]
async fn prepare_regenerate_writes_nothing() {
    let service = service();
    let (conversation_id, ids) = linear_conversation(&service).await;
    let before = service.store().revision(&conversation_id).await.unwrap();

    service
        .prepare_regenerate(&alice(), &conversation_id, &ids[0])
        .await
        .unwrap();
    assert_eq!(service.store().revision(&conversation_id).await.unwrap(), before);
}

#[tokio::test]
async fn cancel_without_content_leaves_conversation_untouched() {
    let service = service();
    let caller = alice();
    let (conversation_id, ids) = linear_conversation(&service).await;
    let sent = service
        .send(&caller, &conversation_id, None, "tell me a story")
        .await
        .unwrap();
    let revision = service.store().revision(&conversation_id).await.unwrap();

    let partial = service
        .cancel_reply(&caller, &conversation_id, &sent.message.id, None)
        .await
        .unwrap();
    assert!(partial.is_none());
    assert_eq!(service.store().revision(&conversation_id).await.unwrap(), revision);

    let history = service
        .get_history(&caller, &conversation_id, HistoryView::Tree)
        .await
        .unwrap();
    assert_eq!(history.current_message_id, Some(sent.message.id.clone()));
    assert_eq!(history.nodes.len(), ids.len() + 1);
}

#[tokio::test]
async fn cancel_with_content_keeps_partial_reply_out_of_context() {
    let service = service();
    let caller = alice();
    let (conversation_id, _) = linear_conversation(&service).await;
    let sent = service
        .send(&caller, &conversation_id, None, "tell me a story")
        .await
        .unwrap();

    let partial = service
        .cancel_reply(
            &caller,
            &conversation_id,
            &sent.message.id,
            Some("Once upon a".to_string()),
        )
        .await
        .unwrap()
        .expect("partial reply stored");
    assert_eq!(partial.status, MessageStatus::Partial);
    assert_eq!(partial.role, Role::Assistant);

    let next = service
        .send(&caller, &conversation_id, None, "never mind")
        .await
        .unwrap();
    assert_eq!(next.message.parent_id.as_ref(), Some(&partial.id));
    assert!(!contents(&next.context).contains(&"Once upon a"));
    assert_eq!(contents(&next.context).last(), Some(&"never mind"));
}

#[tokio::test]
async fn deleted_message_drops_out_of_context_but_keeps_descendants() {
    let service = service();
    let caller = alice();
    let (conversation_id, ids) = linear_conversation(&service).await;

    let deleted = service.delete_message(&caller, &ids[1]).await.unwrap();
    assert!(deleted.is_deleted());
    // Idempotent.
    service.delete_message(&caller, &ids[1]).await.unwrap();

    let outcome = service
        .send(&caller, &conversation_id, None, "still there?")
        .await
        .unwrap();
    assert_eq!(
        contents(&outcome.context),
        vec!["hello", "how are you", "fine", "still there?"]
    );
}

#[tokio::test]
async fn ownership_is_checked_on_every_operation() {
    let service = service();
    let (conversation_id, ids) = linear_conversation(&service).await;
    let mallory = CallerContext::new("mallory");

    let error = service
        .get_history(&mallory, &conversation_id, HistoryView::Tree)
        .await
        .unwrap_err();
    assert!(matches!(error, ServiceError::Forbidden { .. }));

    let error = service.get_siblings(&mallory, &ids[0]).await.unwrap_err();
    assert!(matches!(error, ServiceError::Forbidden { .. }));

    let error = service
        .send(&mallory, &conversation_id, None, "hijack")
        .await
        .unwrap_err();
    assert!(matches!(error, ServiceError::Forbidden { .. }));

    let error = service
        .switch_branch(&alice(), &ConversationId::new("missing"), &ids[0])
        .await
        .unwrap_err();
    assert!(matches!(error, ServiceError::ConversationNotFound(_)));

    assert!(service.list_conversations(&mallory).await.unwrap().is_empty());
    assert_eq!(service.list_conversations(&alice()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn stale_ids_surface_as_node_not_found() {
    let service = service();
    let (conversation_id, _) = linear_conversation(&service).await;
    let ghost = MessageId::new("ghost");

    let error = service.get_siblings(&alice(), &ghost).await.unwrap_err();
    assert!(matches!(error, ServiceError::Branch(BranchError::NodeNotFound(_))));
    assert!(error.is_recoverable());

    let error = service
        .switch_branch(&alice(), &conversation_id, &ghost)
        .await
        .unwrap_err();
    assert!(matches!(error, ServiceError::Branch(BranchError::NodeNotFound(_))));

    let error = service
        .commit_reply(&alice(), &conversation_id, &ghost, "reply")
        .await
        .unwrap_err();
    assert!(matches!(error, ServiceError::Branch(BranchError::NodeNotFound(_))));
}

#[tokio::test]
async fn message_from_another_conversation_is_not_a_valid_target() {
    let service = service();
    let caller = alice();
    let (first, first_ids) = linear_conversation(&service).await;
    let (second, _) = linear_conversation(&service).await;
    assert_ne!(first, second);

    let error = service
        .switch_branch(&caller, &second, &first_ids[0])
        .await
        .unwrap_err();
    assert!(matches!(error, ServiceError::Branch(BranchError::NodeNotFound(_))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_appends_on_one_parent_both_survive() {
    let service = Arc::new(service());
    let caller = alice();
    let conversation = service.create_conversation(&caller).await.unwrap();
    let root = service
        .send(&caller, &conversation.id, None, "question")
        .await
        .unwrap()
        .message;

    let tasks = (0..2).map(|n| {
        let service = service.clone();
        let caller = caller.clone();
        let conversation_id = conversation.id.clone();
        let parent = root.id.clone();
        tokio::spawn(async move {
            service
                .append_message(
                    &caller,
                    &conversation_id,
                    Some(parent),
                    Role::Assistant,
                    format!("answer {n}"),
                )
                .await
        })
    });
    let appended: Vec<_> = futures::future::join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.expect("task").expect("append"))
        .collect();

    let siblings = service.get_siblings(&caller, &appended[0].id).await.unwrap();
    assert_eq!(siblings.total, 2);
    for message in &appended {
        assert!(siblings.sibling_ids.contains(&message.id));
    }

    let history = service
        .get_history(&caller, &conversation.id, HistoryView::Tree)
        .await
        .unwrap();
    let pointer = history.current_message_id.expect("pointer set");
    // The later writer wins the pointer, and it is also the newest child.
    assert_eq!(siblings.sibling_ids.last(), Some(&pointer));
    assert_eq!(history.active_path.leaf(), Some(&pointer));
}

#[tokio::test]
async fn sqlite_backed_service_records_branch_events() {
    let dir = tempdir().expect("tempdir");
    let store = SqliteBranchStore::new(dir.path().join("branches.db"));
    store.init().await.expect("init store");
    let events = JsonlEventLog::new(dir.path().join("events"));
    events.init().await.expect("init events");
    let events = Arc::new(events);

    let service = BranchService::new(
        Arc::new(store),
        events.clone(),
        BranchServiceConfig {
            forest_cache_size: 2,
            max_context_messages: Some(2),
        },
    );
    let (conversation_id, ids) = linear_conversation(&service).await;

    let outcome = service
        .send(&alice(), &conversation_id, Some(ids[1].clone()), "different question")
        .await
        .unwrap();
    assert_eq!(
        contents(&outcome.context),
        vec!["hi there", "different question"]
    );

    service
        .switch_branch(&alice(), &conversation_id, &ids[2])
        .await
        .unwrap();

    let recorded = events.load_events(&conversation_id).await.unwrap();
    assert!(matches!(
        recorded.first().map(|r| &r.event),
        Some(BranchEvent::ConversationCreated { .. })
    ));
    let forks: Vec<_> = recorded
        .iter()
        .filter(|r| matches!(r.event, BranchEvent::MessageAppended { forked: true, .. }))
        .collect();
    assert_eq!(forks.len(), 1);
    assert!(matches!(
        recorded.last().map(|r| &r.event),
        Some(BranchEvent::BranchSwitched { leaf_id: Some(leaf), .. }) if leaf == &ids[3]
    ));
}

#[tokio::test]
async fn zero_context_limit_keeps_the_whole_path() {
    let service = BranchService::new(
        Arc::new(InMemoryBranchStore::new()),
        Arc::new(NoopEventLog),
        BranchServiceConfig {
            max_context_messages: Some(0),
            ..BranchServiceConfig::default()
        },
    );
    let (conversation_id, _) = linear_conversation(&service).await;

    let outcome = service
        .send(&alice(), &conversation_id, None, "still there?")
        .await
        .unwrap();
    assert_eq!(outcome.context.len(), 5);
    assert_eq!(outcome.context[4].content, "still there?");
}
