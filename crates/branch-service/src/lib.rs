//! branch-service - the conversation branch engine behind an ownership and
//! locking boundary.
//!
//! Every write to a conversation (append, fork, switch, delete, cancel) runs
//! under that conversation's lock, so the read-forest -> resolve -> append ->
//! update-pointer sequence never interleaves with another writer. Model
//! generation happens between [`BranchService::send`] and
//! [`BranchService::commit_reply`], outside the lock.

pub mod cache;
pub mod caller;
pub mod error;
pub mod history;
pub mod locks;
pub mod service;

pub use cache::ForestCache;
pub use caller::CallerContext;
pub use error::{Result, ServiceError};
pub use history::{History, HistoryView, SendOutcome};
pub use locks::{ConversationGuard, ConversationLocks};
pub use service::{BranchService, BranchServiceConfig};
