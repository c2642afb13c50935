use std::collections::HashMap;

use async_trait::async_trait;
use branch_core::{Conversation, ConversationId, Message, MessageId, MessageStatus};
use chrono::Utc;
use tokio::sync::RwLock;

use crate::error::{StoreError, StoreResult};
use crate::traits::{ConversationStore, MessageStore};

#[derive(Debug, Default)]
struct Inner {
    messages: HashMap<MessageId, Message>,
    conversations: HashMap<ConversationId, Conversation>,
    revisions: HashMap<ConversationId, u64>,
}

/// Process-local store, used by tests and by `storage = "memory"`.
#[derive(Debug, Default)]
pub struct InMemoryBranchStore {
    inner: RwLock<Inner>,
}

impl InMemoryBranchStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Inner {
    fn bump(&mut self, conversation_id: &ConversationId) -> StoreResult<()> {
        let conversation = self
            .conversations
            .get_mut(conversation_id)
            .ok_or_else(|| StoreError::ConversationNotFound(conversation_id.clone()))?;
        conversation.updated_at = Utc::now();
        *self.revisions.entry(conversation_id.clone()).or_default() += 1;
        Ok(())
    }
}

#[async_trait]
impl MessageStore for InMemoryBranchStore {
    async fn init(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn insert_message(&self, message: &Message) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if inner.messages.contains_key(&message.id) {
            return Err(StoreError::DuplicateMessage(message.id.clone()));
        }
        inner.bump(&message.conversation_id)?;
        inner.messages.insert(message.id.clone(), message.clone());
        Ok(())
    }

    async fn append_message(&self, message: &Message) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if inner.messages.contains_key(&message.id) {
            return Err(StoreError::DuplicateMessage(message.id.clone()));
        }
        inner.bump(&message.conversation_id)?;
        if let Some(conversation) = inner.conversations.get_mut(&message.conversation_id) {
            conversation.current_message_id = Some(message.id.clone());
        }
        inner.messages.insert(message.id.clone(), message.clone());
        Ok(())
    }

    async fn get_message(&self, id: &MessageId) -> StoreResult<Option<Message>> {
        Ok(self.inner.read().await.messages.get(id).cloned())
    }

    async fn list_messages(&self, conversation_id: &ConversationId) -> StoreResult<Vec<Message>> {
        let inner = self.inner.read().await;
        let mut messages: Vec<Message> = inner
            .messages
            .values()
            .filter(|message| &message.conversation_id == conversation_id)
            .cloned()
            .collect();
        messages.sort_by(|a, b| a.order_key().cmp(&b.order_key()));
        Ok(messages)
    }

    async fn update_status(&self, id: &MessageId, status: MessageStatus) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let message = inner
            .messages
            .get_mut(id)
            .ok_or_else(|| StoreError::MessageNotFound(id.clone()))?;
        message.status = status;
        let conversation_id = message.conversation_id.clone();
        inner.bump(&conversation_id)
    }

    async fn revision(&self, conversation_id: &ConversationId) -> StoreResult<u64> {
        let inner = self.inner.read().await;
        if !inner.conversations.contains_key(conversation_id) {
            return Err(StoreError::ConversationNotFound(conversation_id.clone()));
        }
        Ok(inner.revisions.get(conversation_id).copied().unwrap_or(0))
    }
}

#[async_trait]
impl ConversationStore for InMemoryBranchStore {
    async fn create_conversation(&self, conversation: &Conversation) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if inner.conversations.contains_key(&conversation.id) {
            return Err(StoreError::InvalidData(format!(
                "conversation already exists: {}",
                conversation.id
            )));
        }
        inner
            .conversations
            .insert(conversation.id.clone(), conversation.clone());
        Ok(())
    }

    async fn get_conversation(&self, id: &ConversationId) -> StoreResult<Option<Conversation>> {
        Ok(self.inner.read().await.conversations.get(id).cloned())
    }

    async fn list_conversations(&self, owner_id: &str) -> StoreResult<Vec<Conversation>> {
        let inner = self.inner.read().await;
        let mut conversations: Vec<Conversation> = inner
            .conversations
            .values()
            .filter(|conversation| conversation.is_owned_by(owner_id))
            .cloned()
            .collect();
        conversations.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then_with(|| a.id.as_str().cmp(b.id.as_str()))
        });
        Ok(conversations)
    }

    async fn set_current_message(
        &self,
        id: &ConversationId,
        message_id: Option<&MessageId>,
    ) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let conversation = inner
            .conversations
            .get_mut(id)
            .ok_or_else(|| StoreError::ConversationNotFound(id.clone()))?;
        conversation.current_message_id = message_id.cloned();
        conversation.updated_at = Utc::now();
        Ok(())
    }
}
