use std::sync::Arc;

use branch_core::{
    assemble_context, assemble_context_with_limit, resolve_active_path, trace_to_root,
    ActivePath, Conversation, ConversationId, Forest, Message, MessageId, MessageStatus, Role,
};
use branch_store::BranchEvent;
use chrono::{DateTime, Duration, Utc};

use super::BranchService;
use crate::caller::CallerContext;
use crate::error::{Result, ServiceError};
use crate::history::SendOutcome;

impl BranchService {
    /// Appends a message and moves the pointer to it.
    ///
    /// Without an explicit `parent_id` the message continues from the
    /// conversation pointer; with one it forks under that parent. The new
    /// message becomes a root only when neither is set.
    pub async fn append_message(
        &self,
        caller: &CallerContext,
        conversation_id: &ConversationId,
        parent_id: Option<MessageId>,
        role: Role,
        content: impl Into<String>,
    ) -> Result<Message> {
        let _guard = self.locks.acquire(conversation_id).await;
        let conversation = self.authorize(caller, conversation_id).await?;
        let parent_id = parent_id.or_else(|| conversation.current_message_id.clone());
        let (message, _) = self
            .append_locked(&conversation, parent_id, role, content.into(), MessageStatus::Active)
            .await?;
        Ok(message)
    }

    /// Appends a user message and returns the context for model invocation.
    pub async fn send(
        &self,
        caller: &CallerContext,
        conversation_id: &ConversationId,
        parent_id: Option<MessageId>,
        content: impl Into<String>,
    ) -> Result<SendOutcome> {
        let content = require_content(content.into())?;

        let _guard = self.locks.acquire(conversation_id).await;
        let conversation = self.authorize(caller, conversation_id).await?;
        let parent_id = parent_id.or_else(|| conversation.current_message_id.clone());
        let (message, forest) = self
            .append_locked(&conversation, parent_id, Role::User, content, MessageStatus::Active)
            .await?;

        let path = resolve_active_path(&forest, Some(&message.id));
        let context = self.context_for(&forest, &path)?;
        Ok(SendOutcome { message, context })
    }

    /// Forks an edited copy of a user message as its sibling.
    pub async fn edit(
        &self,
        caller: &CallerContext,
        conversation_id: &ConversationId,
        message_id: &MessageId,
        content: impl Into<String>,
    ) -> Result<SendOutcome> {
        let content = require_content(content.into())?;

        let _guard = self.locks.acquire(conversation_id).await;
        let conversation = self.authorize(caller, conversation_id).await?;
        let forest = self.load_forest(conversation_id).await?;
        let original = forest.require(message_id)?;
        if original.role != Role::User {
            return Err(ServiceError::InvalidRequest(format!(
                "only user messages can be edited, {message_id} is {}",
                original.role.as_str()
            )));
        }

        let parent_id = original.parent_id.clone();
        let (message, forest) = self
            .append_locked(&conversation, parent_id, Role::User, content, MessageStatus::Active)
            .await?;

        let path = resolve_active_path(&forest, Some(&message.id));
        let context = self.context_for(&forest, &path)?;
        Ok(SendOutcome { message, context })
    }

    /// Context ending at `user_message_id`, for generating an alternative
    /// reply. Nothing is written until the reply is committed.
    pub async fn prepare_regenerate(
        &self,
        caller: &CallerContext,
        conversation_id: &ConversationId,
        user_message_id: &MessageId,
    ) -> Result<SendOutcome> {
        self.authorize(caller, conversation_id).await?;
        let forest = self.load_forest(conversation_id).await?;
        let message = forest.require(user_message_id)?.clone();
        if message.role != Role::User {
            return Err(ServiceError::InvalidRequest(format!(
                "replies are regenerated from a user message, {user_message_id} is {}",
                message.role.as_str()
            )));
        }

        let path = ActivePath::from(trace_to_root(&forest, user_message_id)?);
        let context = self.context_for(&forest, &path)?;
        Ok(SendOutcome { message, context })
    }

    /// Stores a finished assistant reply under `parent_id`.
    ///
    /// A second reply under the same parent is a regeneration: both replies
    /// stay, as siblings.
    pub async fn commit_reply(
        &self,
        caller: &CallerContext,
        conversation_id: &ConversationId,
        parent_id: &MessageId,
        content: impl Into<String>,
    ) -> Result<Message> {
        let content = require_content(content.into())?;

        let _guard = self.locks.acquire(conversation_id).await;
        let conversation = self.authorize(caller, conversation_id).await?;
        let (message, _) = self
            .append_locked(
                &conversation,
                Some(parent_id.clone()),
                Role::Assistant,
                content,
                MessageStatus::Active,
            )
            .await?;
        Ok(message)
    }

    /// Ends a generation that will not complete.
    ///
    /// Without partial content nothing is written to the conversation. With
    /// content, the text is kept as a `partial` assistant message (excluded
    /// from future context) and the pointer moves to it.
    pub async fn cancel_reply(
        &self,
        caller: &CallerContext,
        conversation_id: &ConversationId,
        parent_id: &MessageId,
        partial_content: Option<String>,
    ) -> Result<Option<Message>> {
        let partial_content = partial_content.filter(|content| !content.trim().is_empty());

        let _guard = self.locks.acquire(conversation_id).await;
        let conversation = self.authorize(caller, conversation_id).await?;

        let partial = match partial_content {
            None => {
                let forest = self.load_forest(conversation_id).await?;
                forest.require(parent_id)?;
                None
            }
            Some(content) => {
                let (message, _) = self
                    .append_locked(
                        &conversation,
                        Some(parent_id.clone()),
                        Role::Assistant,
                        content,
                        MessageStatus::Partial,
                    )
                    .await?;
                Some(message)
            }
        };

        self.record(
            conversation_id,
            BranchEvent::ReplyCancelled {
                parent_id: parent_id.clone(),
                partial_message_id: partial.as_ref().map(|message| message.id.clone()),
            },
        )
        .await;

        tracing::info!(
            conversation_id = %conversation_id,
            parent_id = %parent_id,
            kept_partial = partial.is_some(),
            "BranchService: reply cancelled"
        );
        Ok(partial)
    }

    /// Writes one message and moves the pointer to it. Callers hold the
    /// conversation lock. Returns the message and the forest that includes it.
    async fn append_locked(
        &self,
        conversation: &Conversation,
        parent_id: Option<MessageId>,
        role: Role,
        content: String,
        status: MessageStatus,
    ) -> Result<(Message, Arc<Forest>)> {
        let forest = self.load_forest(&conversation.id).await?;
        let forked = match &parent_id {
            Some(parent) => {
                forest.require(parent)?;
                !forest.children_of(parent).is_empty()
            }
            None => !forest.roots().is_empty(),
        };

        let message = Message::new(
            conversation.id.clone(),
            parent_id.clone(),
            role,
            content,
            next_timestamp(&forest, Utc::now()),
        )
        .with_status(status);

        self.store.append_message(&message).await?;
        self.record(
            &conversation.id,
            BranchEvent::MessageAppended {
                message_id: message.id.clone(),
                parent_id,
                role,
                forked,
            },
        )
        .await;

        tracing::info!(
            conversation_id = %conversation.id,
            message_id = %message.id,
            role = role.as_str(),
            forked,
            "BranchService: message appended"
        );

        let forest = self.load_forest(&conversation.id).await?;
        Ok((message, forest))
    }

    fn context_for(&self, forest: &Forest, path: &ActivePath) -> Result<Vec<Message>> {
        let context = match self.max_context_messages {
            Some(limit) => assemble_context_with_limit(forest, path, limit)?,
            None => assemble_context(forest, path)?,
        };
        Ok(context)
    }
}

/// Strictly after every message already in the forest, so the latest append
/// is always the newest child under `(created_at, id)` ordering.
fn next_timestamp(forest: &Forest, now: DateTime<Utc>) -> DateTime<Utc> {
    match forest.latest_created_at() {
        Some(latest) if latest >= now => latest + Duration::microseconds(1),
        _ => now,
    }
}

fn require_content(content: String) -> Result<String> {
    if content.trim().is_empty() {
        return Err(ServiceError::InvalidRequest(
            "content must not be empty".to_string(),
        ));
    }
    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use branch_core::TreeBuilder;
    use chrono::TimeZone;

    #[test]
    fn timestamp_moves_past_clock_skew() {
        let at = Utc.with_ymd_and_hms(2026, 5, 1, 0, 0, 0).single().unwrap();
        let forest = TreeBuilder::build(vec![Message::new(
            ConversationId::new("c"),
            None,
            Role::User,
            "hi",
            at,
        )])
        .unwrap();

        assert_eq!(next_timestamp(&forest, at), at + Duration::microseconds(1));
        assert_eq!(
            next_timestamp(&forest, at - Duration::seconds(5)),
            at + Duration::microseconds(1)
        );
        let later = at + Duration::seconds(1);
        assert_eq!(next_timestamp(&forest, later), later);
        assert_eq!(next_timestamp(&Forest::default(), at), at);
    }

    #[test]
    fn blank_content_is_rejected() {
        assert!(require_content("  \n".to_string()).is_err());
        assert_eq!(require_content("hi".to_string()).unwrap(), "hi");
    }
}
