//! PathResolver: canonical root-to-leaf active path
//!
//! active path = trace_to_root(anchor) ++ extend_to_leaf(anchor)[1..]
//!
//! Extending always follows the newest child, so after a fork the most
//! recently created branch is the default continuation.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::message::MessageId;
use crate::tree::Forest;

/// Ordered message ids from a root to a leaf. Derived, never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActivePath(Vec<MessageId>);

impl ActivePath {
    pub fn ids(&self) -> &[MessageId] {
        &self.0
    }

    pub fn into_ids(self) -> Vec<MessageId> {
        self.0
    }

    pub fn leaf(&self) -> Option<&MessageId> {
        self.0.last()
    }

    pub fn root(&self) -> Option<&MessageId> {
        self.0.first()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, id: &MessageId) -> bool {
        self.0.contains(id)
    }
}

impl From<Vec<MessageId>> for ActivePath {
    fn from(ids: Vec<MessageId>) -> Self {
        Self(ids)
    }
}

/// Resolves the active path through `anchor`.
///
/// An absent or unknown anchor falls back to the oldest root; an empty forest
/// yields an empty path.
pub fn resolve_active_path(forest: &Forest, anchor: Option<&MessageId>) -> ActivePath {
    let start = match anchor.filter(|id| forest.contains(id)) {
        Some(id) => id,
        None => match forest.oldest_root() {
            Some(root) => root,
            None => return ActivePath::default(),
        },
    };

    let mut ids = upward(forest, start);
    ids.extend(downward(forest, start).into_iter().skip(1));
    ActivePath(ids)
}

/// Ids from the root down to `id`, inclusive.
pub fn trace_to_root(forest: &Forest, id: &MessageId) -> Result<Vec<MessageId>> {
    forest.require(id)?;
    Ok(upward(forest, id))
}

/// Ids from `id` down to a leaf, following the newest child at every step.
pub fn extend_to_leaf(forest: &Forest, id: &MessageId) -> Result<Vec<MessageId>> {
    forest.require(id)?;
    Ok(downward(forest, id))
}

// Both walks rely on the forest being acyclic, which TreeBuilder guarantees.
fn upward(forest: &Forest, id: &MessageId) -> Vec<MessageId> {
    let mut ids = vec![id.clone()];
    let mut current = id;
    while let Some(parent_id) = forest.parent_of(current) {
        ids.push(parent_id.clone());
        current = parent_id;
    }
    ids.reverse();
    ids
}

fn downward(forest: &Forest, id: &MessageId) -> Vec<MessageId> {
    let mut ids = vec![id.clone()];
    let mut current = id;
    while let Some(child_id) = forest.newest_child(current) {
        ids.push(child_id.clone());
        current = child_id;
    }
    ids
}
