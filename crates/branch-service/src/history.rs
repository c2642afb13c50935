use branch_core::{ActivePath, BranchPoint, ConversationId, Message, MessageId, TreeNode};
use serde::{Deserialize, Serialize};

/// How much of the forest `get_history` returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryView {
    /// Every node with sibling metadata.
    #[default]
    Tree,
    /// Only the nodes of the active path, for lightweight clients.
    #[serde(alias = "path")]
    ActivePath,
}

impl HistoryView {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "tree" => Some(Self::Tree),
            "path" | "active_path" => Some(Self::ActivePath),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct History {
    pub conversation_id: ConversationId,
    pub current_message_id: Option<MessageId>,
    pub view: HistoryView,
    pub active_path: ActivePath,
    pub nodes: Vec<TreeNode>,
    pub branch_points: Vec<BranchPoint>,
}

/// A stored message and the context to hand to model invocation.
#[derive(Debug, Clone, Serialize)]
pub struct SendOutcome {
    pub message: Message,
    pub context: Vec<Message>,
}
