use branch_core::{BranchError, ConversationId};
use branch_store::StoreError;
use thiserror::Error;

pub type Result<T, E = ServiceError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Branch(#[from] BranchError),

    #[error(transparent)]
    Store(StoreError),

    #[error("conversation not found: {0}")]
    ConversationNotFound(ConversationId),

    #[error("user {user_id} may not access conversation {conversation_id}")]
    Forbidden {
        user_id: String,
        conversation_id: ConversationId,
    },

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ServiceError {
    /// Failures the client can act on (refresh, pick another id, fix the
    /// request). Everything else is an integrity or storage incident.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Branch(BranchError::NodeNotFound(_)) => true,
            Self::Branch(_) | Self::Store(_) => false,
            Self::ConversationNotFound(_)
            | Self::Forbidden { .. }
            | Self::InvalidRequest(_) => true,
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::ConversationNotFound(id) => Self::ConversationNotFound(id),
            StoreError::MessageNotFound(id) => Self::Branch(BranchError::NodeNotFound(id)),
            other => Self::Store(other),
        }
    }
}
