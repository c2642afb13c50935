use async_trait::async_trait;
use branch_core::{Conversation, ConversationId, Message, MessageId, MessageStatus};

use crate::error::StoreResult;

/// Durable keyed storage for message records.
///
/// Append-only with respect to content: the only mutation a stored message
/// accepts is a status change.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Prepares the backing storage (schema, directories).
    async fn init(&self) -> StoreResult<()>;

    /// Fails with `DuplicateMessage` when the id exists and with
    /// `ConversationNotFound` when the conversation does not.
    async fn insert_message(&self, message: &Message) -> StoreResult<()>;

    /// Inserts `message` and moves its conversation's pointer to it as one
    /// atomic write. Either both happen or neither does.
    async fn append_message(&self, message: &Message) -> StoreResult<()>;

    async fn get_message(&self, id: &MessageId) -> StoreResult<Option<Message>>;

    /// Every message of the conversation, ordered by `(created_at, id)`.
    async fn list_messages(&self, conversation_id: &ConversationId) -> StoreResult<Vec<Message>>;

    async fn update_status(&self, id: &MessageId, status: MessageStatus) -> StoreResult<()>;

    /// Monotonic counter bumped by every insert and status change of the
    /// conversation's messages.
    async fn revision(&self, conversation_id: &ConversationId) -> StoreResult<u64>;
}

/// Conversation records and their `current_message_id` pointer.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn create_conversation(&self, conversation: &Conversation) -> StoreResult<()>;

    async fn get_conversation(&self, id: &ConversationId) -> StoreResult<Option<Conversation>>;

    /// Conversations of one owner, most recently updated first.
    async fn list_conversations(&self, owner_id: &str) -> StoreResult<Vec<Conversation>>;

    async fn set_current_message(
        &self,
        id: &ConversationId,
        message_id: Option<&MessageId>,
    ) -> StoreResult<()>;
}

/// A store that serves both messages and conversations.
pub trait BranchStore: MessageStore + ConversationStore {}

impl<T: MessageStore + ConversationStore> BranchStore for T {}
