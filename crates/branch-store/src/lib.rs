//! Persistence for the branch engine.
//!
//! Messages are append-only; the only mutation a stored message accepts is a
//! status change. Each conversation keeps a `current_message_id` pointer and a
//! revision counter used by callers to invalidate cached forests.

pub mod error;
pub mod events;
pub mod memory;
pub mod sqlite;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use events::{BranchEvent, EventLog, EventRecord, JsonlEventLog, NoopEventLog};
pub use memory::InMemoryBranchStore;
pub use sqlite::SqliteBranchStore;
pub use traits::{BranchStore, ConversationStore, MessageStore};
