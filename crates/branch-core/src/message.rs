//! Message and conversation records
//!
//! Messages are immutable once created. An edit or a regeneration never
//! rewrites an existing record: it creates a new message whose `parent_id`
//! points at the fork point. The only field that changes after creation is
//! `status` (soft delete, partial marking).

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a message inside the conversation forest.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for MessageId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Identifier of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConversationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ConversationId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "system" => Some(Self::System),
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    #[default]
    Active,
    Deleted,
    /// An assistant reply whose generation was cancelled part way.
    Partial,
}

impl MessageStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Deleted => "deleted",
            Self::Partial => "partial",
        }
    }

    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "active" => Some(Self::Active),
            "deleted" => Some(Self::Deleted),
            "partial" => Some(Self::Partial),
            _ => None,
        }
    }

    /// Whether a message with this status is handed to model invocation.
    pub fn contributes_to_context(self) -> bool {
        matches!(self, Self::Active)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    #[serde(default)]
    pub parent_id: Option<MessageId>,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub status: MessageStatus,
}

impl Message {
    pub fn new(
        conversation_id: ConversationId,
        parent_id: Option<MessageId>,
        role: Role,
        content: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: MessageId::generate(),
            conversation_id,
            parent_id,
            role,
            content: content.into(),
            created_at,
            status: MessageStatus::Active,
        }
    }

    pub fn with_id(mut self, id: impl Into<MessageId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_status(mut self, status: MessageStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn is_deleted(&self) -> bool {
        self.status == MessageStatus::Deleted
    }

    /// Sort key shared by sibling ordering and root selection.
    pub fn order_key(&self) -> (DateTime<Utc>, &MessageId) {
        (self.created_at, &self.id)
    }
}

/// A conversation and its persisted pointer.
///
/// `current_message_id` is a weak reference into the message set: the leaf
/// the user last continued from. It is `None` only while the conversation
/// has no messages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Conversation {
    pub id: ConversationId,
    pub owner_id: String,
    #[serde(default)]
    pub current_message_id: Option<MessageId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(owner_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: ConversationId::generate(),
            owner_id: owner_id.into(),
            current_message_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.owner_id == user_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_and_status_round_trip_through_db_strings() {
        for role in [Role::System, Role::User, Role::Assistant] {
            assert_eq!(Role::from_db(role.as_str()), Some(role));
        }
        for status in [
            MessageStatus::Active,
            MessageStatus::Deleted,
            MessageStatus::Partial,
        ] {
            assert_eq!(MessageStatus::from_db(status.as_str()), Some(status));
        }
        assert_eq!(Role::from_db("tool"), None);
    }

    #[test]
    fn only_active_messages_contribute_to_context() {
        assert!(MessageStatus::Active.contributes_to_context());
        assert!(!MessageStatus::Deleted.contributes_to_context());
        assert!(!MessageStatus::Partial.contributes_to_context());
    }

    #[test]
    fn message_serializes_with_transparent_ids() {
        let message = Message::new(
            ConversationId::new("c1"),
            Some(MessageId::new("a")),
            Role::User,
            "hello",
            Utc::now(),
        )
        .with_id("b");

        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["id"], "b");
        assert_eq!(json["parent_id"], "a");
        assert_eq!(json["role"], "user");
        assert_eq!(json["status"], "active");
    }

    #[test]
    fn new_conversation_has_no_pointer() {
        let conversation = Conversation::new("user-1");
        assert!(conversation.current_message_id.is_none());
        assert!(conversation.is_owned_by("user-1"));
        assert!(!conversation.is_owned_by("user-2"));
    }
}
