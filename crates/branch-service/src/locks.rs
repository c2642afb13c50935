use std::sync::Arc;

use branch_core::ConversationId;
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async mutex per conversation.
///
/// Held across read-forest -> resolve -> append -> update-pointer so two
/// writers on the same conversation never interleave. Different
/// conversations never contend.
#[derive(Debug, Default)]
pub struct ConversationLocks {
    locks: DashMap<ConversationId, Arc<Mutex<()>>>,
}

impl ConversationLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, conversation_id: &ConversationId) -> ConversationGuard<'_> {
        // Clone the Arc out before awaiting so no DashMap shard guard is held
        // across the await.
        let lock = self
            .locks
            .entry(conversation_id.clone())
            .or_default()
            .clone();
        let guard = lock.lock_owned().await;
        ConversationGuard {
            locks: self,
            conversation_id: conversation_id.clone(),
            guard: Some(guard),
        }
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Held lock on one conversation. The map entry is dropped with the last
/// guard once no other task is waiting on it.
pub struct ConversationGuard<'a> {
    locks: &'a ConversationLocks,
    conversation_id: ConversationId,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for ConversationGuard<'_> {
    fn drop(&mut self) {
        // Release first so the map holds the only remaining reference.
        self.guard.take();
        self.locks
            .locks
            .remove_if(&self.conversation_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}
