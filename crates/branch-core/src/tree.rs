//! TreeBuilder: flat message list -> validated forest
//!
//! The forest is rebuilt from a store snapshot on every read instead of being
//! maintained incrementally. Children of a node (and the root list) are kept
//! ordered by `(created_at, id)` ascending.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use crate::error::{BranchError, Result};
use crate::message::{ConversationId, Message, MessageId};

/// Parent-linked forest of one conversation's messages.
#[derive(Debug, Clone, Default)]
pub struct Forest {
    conversation_id: Option<ConversationId>,
    nodes: HashMap<MessageId, Message>,
    /// Every id, ordered by `(created_at, id)`.
    order: Vec<MessageId>,
    /// Children of the root sentinel.
    roots: Vec<MessageId>,
    children: HashMap<MessageId, Vec<MessageId>>,
}

impl Forest {
    pub fn conversation_id(&self) -> Option<&ConversationId> {
        self.conversation_id.as_ref()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: &MessageId) -> Option<&Message> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &MessageId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Like [`Forest::get`] but reports unknown ids as `NodeNotFound`.
    pub fn require(&self, id: &MessageId) -> Result<&Message> {
        self.nodes
            .get(id)
            .ok_or_else(|| BranchError::NodeNotFound(id.clone()))
    }

    pub fn roots(&self) -> &[MessageId] {
        &self.roots
    }

    pub fn oldest_root(&self) -> Option<&MessageId> {
        self.roots.first()
    }

    pub fn children_of(&self, id: &MessageId) -> &[MessageId] {
        self.children.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The most recently created child, i.e. the default forward continuation.
    pub fn newest_child(&self, id: &MessageId) -> Option<&MessageId> {
        self.children_of(id).last()
    }

    pub fn parent_of(&self, id: &MessageId) -> Option<&MessageId> {
        self.nodes.get(id).and_then(|message| message.parent_id.as_ref())
    }

    /// The ordered sibling list containing `id` (the root list for roots).
    pub fn siblings_of(&self, id: &MessageId) -> Result<&[MessageId]> {
        let message = self.require(id)?;
        Ok(match &message.parent_id {
            Some(parent_id) => self.children_of(parent_id),
            None => &self.roots,
        })
    }

    /// All messages ordered by `(created_at, id)`.
    pub fn messages(&self) -> impl Iterator<Item = &Message> + '_ {
        self.order.iter().filter_map(|id| self.nodes.get(id))
    }

    pub fn leaves(&self) -> impl Iterator<Item = &MessageId> + '_ {
        self.order
            .iter()
            .filter(|id| self.children_of(id).is_empty())
    }

    pub fn latest_created_at(&self) -> Option<DateTime<Utc>> {
        self.nodes.values().map(|message| message.created_at).max()
    }
}

/// Builds and validates a [`Forest`].
pub struct TreeBuilder;

impl TreeBuilder {
    /// Builds the forest for one conversation's messages, given in any order.
    ///
    /// Fails without returning a partial forest when the input spans several
    /// conversations, when parent links form a cycle, when an id repeats, or
    /// when a parent id does not resolve inside the input.
    pub fn build(messages: Vec<Message>) -> Result<Forest> {
        let Some(first) = messages.first() else {
            return Ok(Forest::default());
        };
        let conversation_id = first.conversation_id.clone();

        if let Some(stray) = messages
            .iter()
            .find(|message| message.conversation_id != conversation_id)
        {
            return Err(BranchError::MixedConversations {
                expected: conversation_id,
                found: stray.conversation_id.clone(),
            });
        }

        let mut duplicates = Vec::new();
        let mut nodes: HashMap<MessageId, Message> = HashMap::with_capacity(messages.len());
        for message in messages {
            // Later definitions replace earlier ones so a redefined parent link
            // is still checked for cycles below.
            if let Some(previous) = nodes.insert(message.id.clone(), message) {
                duplicates.push(previous.id);
            }
        }

        let mut order: Vec<MessageId> = nodes.keys().cloned().collect();
        order.sort_by(|a, b| nodes[a].order_key().cmp(&nodes[b].order_key()));

        detect_cycles(&nodes, &order)?;

        if let Some(duplicate) = duplicates.into_iter().next() {
            return Err(BranchError::DuplicateNode(duplicate));
        }

        let mut roots = Vec::new();
        let mut children: HashMap<MessageId, Vec<MessageId>> = HashMap::new();
        for id in &order {
            let message = &nodes[id];
            match &message.parent_id {
                None => roots.push(id.clone()),
                Some(parent_id) if nodes.contains_key(parent_id) => {
                    children
                        .entry(parent_id.clone())
                        .or_default()
                        .push(id.clone());
                }
                Some(parent_id) => {
                    return Err(BranchError::OrphanReference {
                        id: id.clone(),
                        parent_id: parent_id.clone(),
                    });
                }
            }
        }

        tracing::debug!(
            conversation_id = %conversation_id,
            message_count = nodes.len(),
            root_count = roots.len(),
            "TreeBuilder: forest built"
        );

        Ok(Forest {
            conversation_id: Some(conversation_id),
            nodes,
            order,
            roots,
            children,
        })
    }
}

/// Walks every node's parent chain with its own visited set. Nodes whose chain
/// already reached a root (or a dangling parent) are remembered, so each link
/// is followed at most once across the whole pass.
fn detect_cycles(nodes: &HashMap<MessageId, Message>, order: &[MessageId]) -> Result<()> {
    let mut terminated: HashSet<&MessageId> = HashSet::with_capacity(nodes.len());

    for start in order {
        let mut walk: Vec<&MessageId> = Vec::new();
        let mut visited: HashSet<&MessageId> = HashSet::new();
        let mut current = Some(start);

        while let Some(id) = current {
            if terminated.contains(id) {
                break;
            }
            if !visited.insert(id) {
                let from = walk.iter().position(|step| *step == id).unwrap_or(0);
                let mut path: Vec<MessageId> =
                    walk[from..].iter().map(|step| (*step).clone()).collect();
                path.push(id.clone());
                return Err(BranchError::CycleDetected { path });
            }
            walk.push(id);
            current = nodes
                .get(id)
                .and_then(|message| message.parent_id.as_ref())
                .filter(|parent_id| nodes.contains_key(*parent_id));
        }

        terminated.extend(walk);
    }

    Ok(())
}
