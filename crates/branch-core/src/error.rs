use thiserror::Error;

use crate::message::{ConversationId, MessageId};

pub type Result<T, E = BranchError> = std::result::Result<T, E>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BranchError {
    #[error("duplicate message id: {0}")]
    DuplicateNode(MessageId),

    #[error("message {id} references parent {parent_id} which is not part of the conversation")]
    OrphanReference { id: MessageId, parent_id: MessageId },

    #[error("parent links form a cycle: {}", format_path(.path))]
    CycleDetected { path: Vec<MessageId> },

    #[error("input spans more than one conversation: {expected} and {found}")]
    MixedConversations {
        expected: ConversationId,
        found: ConversationId,
    },

    #[error("message not found: {0}")]
    NodeNotFound(MessageId),

    #[error("path is not a single branch: {id} does not continue from {expected_parent}")]
    BrokenPath {
        id: MessageId,
        expected_parent: String,
    },
}

impl BranchError {
    /// Structural failures that can only come from corrupted data.
    pub fn is_integrity_violation(&self) -> bool {
        matches!(
            self,
            Self::DuplicateNode(_)
                | Self::OrphanReference { .. }
                | Self::CycleDetected { .. }
                | Self::MixedConversations { .. }
        )
    }
}

fn format_path(path: &[MessageId]) -> String {
    path.iter()
        .map(MessageId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_error_names_the_cycle() {
        let error = BranchError::CycleDetected {
            path: vec!["a".into(), "c".into(), "b".into(), "a".into()],
        };
        assert_eq!(error.to_string(), "parent links form a cycle: a -> c -> b -> a");
        assert!(error.is_integrity_violation());
    }

    #[test]
    fn not_found_is_not_an_integrity_violation() {
        assert!(!BranchError::NodeNotFound("x".into()).is_integrity_violation());
    }
}
