//! Branch service
//!
//! Boundary between callers (HTTP handlers, tests) and the pure branch engine:
//! - ownership checks against an explicit `CallerContext`
//! - forest loading with a revision-keyed LRU cache
//! - per-conversation locking around every pointer/message write
//! - event recording for appends, switches, deletes and cancellations

mod generation;
mod navigation;

use std::sync::Arc;

use branch_core::{
    resolve_active_path, BranchError, BranchNavigator, Conversation, ConversationId, Forest,
    Message, MessageId, MessageStatus, SiblingInfo, TreeBuilder,
};
use branch_store::{BranchEvent, BranchStore, EventLog, EventRecord, NoopEventLog};

use crate::cache::ForestCache;
use crate::caller::CallerContext;
use crate::error::{Result, ServiceError};
use crate::history::{History, HistoryView};
use crate::locks::ConversationLocks;

const DEFAULT_FOREST_CACHE_SIZE: usize = 64;

#[derive(Debug, Clone)]
pub struct BranchServiceConfig {
    pub forest_cache_size: usize,
    /// Upper bound on non-system messages handed to model invocation.
    pub max_context_messages: Option<usize>,
}

impl Default for BranchServiceConfig {
    fn default() -> Self {
        Self {
            forest_cache_size: DEFAULT_FOREST_CACHE_SIZE,
            max_context_messages: None,
        }
    }
}

pub struct BranchService {
    store: Arc<dyn BranchStore>,
    events: Arc<dyn EventLog>,
    locks: ConversationLocks,
    cache: ForestCache,
    max_context_messages: Option<usize>,
}

impl BranchService {
    pub fn new(
        store: Arc<dyn BranchStore>,
        events: Arc<dyn EventLog>,
        config: BranchServiceConfig,
    ) -> Self {
        Self {
            store,
            events,
            locks: ConversationLocks::new(),
            cache: ForestCache::new(config.forest_cache_size),
            max_context_messages: config.max_context_messages.filter(|limit| *limit > 0),
        }
    }

    /// Service without an event log, with default settings.
    pub fn with_store(store: Arc<dyn BranchStore>) -> Self {
        Self::new(store, Arc::new(NoopEventLog), BranchServiceConfig::default())
    }

    pub fn store(&self) -> &Arc<dyn BranchStore> {
        &self.store
    }

    pub async fn create_conversation(&self, caller: &CallerContext) -> Result<Conversation> {
        if caller.user_id.trim().is_empty() {
            return Err(ServiceError::InvalidRequest("user id must not be empty".to_string()));
        }

        let conversation = Conversation::new(caller.user_id.clone());
        self.store.create_conversation(&conversation).await?;
        self.record(
            &conversation.id,
            BranchEvent::ConversationCreated {
                owner_id: conversation.owner_id.clone(),
            },
        )
        .await;

        tracing::info!(
            conversation_id = %conversation.id,
            owner_id = %conversation.owner_id,
            "BranchService: conversation created"
        );
        Ok(conversation)
    }

    pub async fn list_conversations(&self, caller: &CallerContext) -> Result<Vec<Conversation>> {
        Ok(self.store.list_conversations(&caller.user_id).await?)
    }

    pub async fn get_history(
        &self,
        caller: &CallerContext,
        conversation_id: &ConversationId,
        view: HistoryView,
    ) -> Result<History> {
        let conversation = self.authorize(caller, conversation_id).await?;
        let forest = self.load_forest(conversation_id).await?;
        let navigator = BranchNavigator::new(&forest);

        let active_path = resolve_active_path(&forest, conversation.current_message_id.as_ref());
        let branch_points = navigator.branch_points(&active_path)?;
        let nodes = match view {
            HistoryView::Tree => navigator.tree_view(),
            HistoryView::ActivePath => navigator
                .tree_view()
                .into_iter()
                .filter(|node| active_path.contains(&node.message.id))
                .collect(),
        };

        tracing::debug!(
            conversation_id = %conversation_id,
            view = ?view,
            nodes = nodes.len(),
            path_len = active_path.len(),
            "BranchService: history loaded"
        );

        Ok(History {
            conversation_id: conversation.id,
            current_message_id: conversation.current_message_id,
            view,
            active_path,
            nodes,
            branch_points,
        })
    }

    /// Every message of the conversation ordered by `(created_at, id)`.
    pub async fn flat_history(
        &self,
        caller: &CallerContext,
        conversation_id: &ConversationId,
    ) -> Result<Vec<Message>> {
        self.authorize(caller, conversation_id).await?;
        Ok(self.store.list_messages(conversation_id).await?)
    }

    pub async fn get_siblings(
        &self,
        caller: &CallerContext,
        message_id: &MessageId,
    ) -> Result<SiblingInfo> {
        let message = self.message_for_caller(caller, message_id).await?;
        let forest = self.load_forest(&message.conversation_id).await?;
        Ok(BranchNavigator::new(&forest).sibling_info(message_id)?)
    }

    /// Soft delete. The message stays in the forest so its descendants keep a
    /// valid parent; it just stops contributing to context.
    pub async fn delete_message(
        &self,
        caller: &CallerContext,
        message_id: &MessageId,
    ) -> Result<Message> {
        let message = self.message_for_caller(caller, message_id).await?;
        let _guard = self.locks.acquire(&message.conversation_id).await;

        if message.is_deleted() {
            return Ok(message);
        }

        self.store
            .update_status(message_id, MessageStatus::Deleted)
            .await?;
        self.record(
            &message.conversation_id,
            BranchEvent::MessageDeleted {
                message_id: message_id.clone(),
            },
        )
        .await;

        tracing::info!(
            conversation_id = %message.conversation_id,
            message_id = %message_id,
            "BranchService: message soft-deleted"
        );
        Ok(message.with_status(MessageStatus::Deleted))
    }

    /// Loads the conversation and checks that `caller` owns it.
    async fn authorize(
        &self,
        caller: &CallerContext,
        conversation_id: &ConversationId,
    ) -> Result<Conversation> {
        let conversation = self
            .store
            .get_conversation(conversation_id)
            .await?
            .ok_or_else(|| ServiceError::ConversationNotFound(conversation_id.clone()))?;

        if !conversation.is_owned_by(&caller.user_id) {
            tracing::warn!(
                conversation_id = %conversation_id,
                user_id = %caller.user_id,
                "BranchService: access denied"
            );
            return Err(ServiceError::Forbidden {
                user_id: caller.user_id.clone(),
                conversation_id: conversation_id.clone(),
            });
        }
        Ok(conversation)
    }

    async fn message_for_caller(
        &self,
        caller: &CallerContext,
        message_id: &MessageId,
    ) -> Result<Message> {
        let message = self
            .store
            .get_message(message_id)
            .await?
            .ok_or_else(|| BranchError::NodeNotFound(message_id.clone()))?;
        self.authorize(caller, &message.conversation_id).await?;
        Ok(message)
    }

    /// Builds (or reuses) the forest for the conversation's current revision.
    async fn load_forest(&self, conversation_id: &ConversationId) -> Result<Arc<Forest>> {
        let revision = self.store.revision(conversation_id).await?;
        if let Some(forest) = self.cache.get(conversation_id, revision).await {
            return Ok(forest);
        }

        let messages = self.store.list_messages(conversation_id).await?;
        let forest = TreeBuilder::build(messages).map_err(|error| {
            if error.is_integrity_violation() {
                tracing::error!(
                    conversation_id = %conversation_id,
                    error = %error,
                    "BranchService: data integrity incident while building forest"
                );
            }
            error
        })?;

        let forest = Arc::new(forest);
        self.cache
            .insert(conversation_id.clone(), revision, forest.clone())
            .await;
        Ok(forest)
    }

    /// Event log failures never fail the operation that produced the event.
    async fn record(&self, conversation_id: &ConversationId, event: BranchEvent) {
        let record = EventRecord::now(conversation_id.clone(), event);
        if let Err(error) = self.events.append_event(&record).await {
            tracing::warn!(
                conversation_id = %conversation_id,
                error = %error,
                "BranchService: failed to record branch event"
            );
        }
    }
}
