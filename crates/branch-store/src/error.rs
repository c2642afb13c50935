use branch_core::{ConversationId, MessageId};
use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("time parse error: {0}")]
    Chrono(#[from] chrono::ParseError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("storage task join error: {0}")]
    Task(String),

    #[error("invalid stored data: {0}")]
    InvalidData(String),

    #[error("message already exists: {0}")]
    DuplicateMessage(MessageId),

    #[error("conversation not found: {0}")]
    ConversationNotFound(ConversationId),

    #[error("message not found: {0}")]
    MessageNotFound(MessageId),
}
