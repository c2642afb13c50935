//! BranchNavigator: sibling metadata and branch switching
//!
//! Side-effect free. Persisting the leaf of a switched path as the
//! conversation pointer is the caller's job.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::message::{Message, MessageId};
use crate::path::{resolve_active_path, ActivePath};
use crate::tree::Forest;

/// Position of a node among its siblings.
///
/// Serialized as `{current, total, siblings}` for the "⟨1/2⟩" navigation UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiblingInfo {
    #[serde(rename = "current")]
    pub index: usize,
    pub total: usize,
    #[serde(rename = "siblings")]
    pub sibling_ids: Vec<MessageId>,
}

impl SiblingInfo {
    /// Callers hide branch navigation when this is false.
    pub fn has_alternatives(&self) -> bool {
        self.total > 1
    }
}

/// Sibling metadata for one node of an active path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchPoint {
    pub message_id: MessageId,
    #[serde(flatten)]
    pub siblings: SiblingInfo,
}

/// A node of the tree view handed to clients for initial render.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeNode {
    pub message: Message,
    pub children: Vec<MessageId>,
    pub sibling_index: usize,
    pub sibling_total: usize,
}

pub struct BranchNavigator<'a> {
    forest: &'a Forest,
}

impl<'a> BranchNavigator<'a> {
    pub fn new(forest: &'a Forest) -> Self {
        Self { forest }
    }

    pub fn sibling_info(&self, id: &MessageId) -> Result<SiblingInfo> {
        let siblings = self.forest.siblings_of(id)?;
        // siblings_of already proved `id` exists, and every node is listed
        // under its parent (or the root list).
        let index = siblings
            .iter()
            .position(|sibling| sibling == id)
            .unwrap_or_default();
        Ok(SiblingInfo {
            index,
            total: siblings.len(),
            sibling_ids: siblings.to_vec(),
        })
    }

    /// Active path anchored at `target`.
    pub fn switch_to(&self, target: &MessageId) -> Result<ActivePath> {
        self.forest.require(target)?;
        Ok(resolve_active_path(self.forest, Some(target)))
    }

    /// Switches to the sibling `offset` positions away from `id`, clamped to
    /// the ends of the sibling list.
    pub fn switch_relative(&self, id: &MessageId, offset: isize) -> Result<ActivePath> {
        let info = self.sibling_info(id)?;
        let last = info.total.saturating_sub(1) as isize;
        let target = (info.index as isize).saturating_add(offset).clamp(0, last) as usize;
        self.switch_to(&info.sibling_ids[target])
    }

    /// Nodes of `path` that have at least one alternative sibling.
    pub fn branch_points(&self, path: &ActivePath) -> Result<Vec<BranchPoint>> {
        let mut points = Vec::new();
        for id in path.ids() {
            let siblings = self.sibling_info(id)?;
            if siblings.has_alternatives() {
                points.push(BranchPoint {
                    message_id: id.clone(),
                    siblings,
                });
            }
        }
        Ok(points)
    }

    /// Every node with its children and sibling position, ordered by
    /// `(created_at, id)`.
    pub fn tree_view(&self) -> Vec<TreeNode> {
        self.forest
            .messages()
            .map(|message| {
                let (sibling_index, sibling_total) = self
                    .sibling_info(&message.id)
                    .map(|info| (info.index, info.total))
                    .unwrap_or((0, 1));
                TreeNode {
                    message: message.clone(),
                    children: self.forest.children_of(&message.id).to_vec(),
                    sibling_index,
                    sibling_total,
                }
            })
            .collect()
    }
}
