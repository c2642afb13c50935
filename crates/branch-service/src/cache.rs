use std::num::NonZeroUsize;
use std::sync::Arc;

use branch_core::{ConversationId, Forest};
use lru::LruCache;
use tokio::sync::Mutex;

/// Built forests keyed by conversation, valid for one store revision.
pub struct ForestCache {
    entries: Mutex<LruCache<ConversationId, (u64, Arc<Forest>)>>,
}

impl ForestCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// The cached forest, if it was built at exactly `revision`.
    pub async fn get(
        &self,
        conversation_id: &ConversationId,
        revision: u64,
    ) -> Option<Arc<Forest>> {
        let mut entries = self.entries.lock().await;
        match entries.get(conversation_id) {
            Some((cached, forest)) if *cached == revision => Some(forest.clone()),
            _ => None,
        }
    }

    pub async fn insert(
        &self,
        conversation_id: ConversationId,
        revision: u64,
        forest: Arc<Forest>,
    ) {
        self.entries
            .lock()
            .await
            .put(conversation_id, (revision, forest));
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}
