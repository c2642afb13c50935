//! branch-core - the conversation branch engine
//!
//! Conversations are stored as a parent-linked forest of immutable messages.
//! This crate turns a snapshot of that forest into the views a chat client
//! and a model invocation layer need:
//! - `tree` - TreeBuilder, validates a flat message list into a [`Forest`]
//! - `path` - PathResolver, the root-to-leaf active path through an anchor
//! - `navigator` - BranchNavigator, sibling metadata and branch switches
//! - `context` - ContextAssembler, the message sequence for one branch
//!
//! Everything here is synchronous and performs no I/O.

pub mod context;
pub mod error;
pub mod message;
pub mod navigator;
pub mod path;
pub mod tree;

pub use context::{assemble_context, assemble_context_with_limit};
pub use error::{BranchError, Result};
pub use message::{Conversation, ConversationId, Message, MessageId, MessageStatus, Role};
pub use navigator::{BranchNavigator, BranchPoint, SiblingInfo, TreeNode};
pub use path::{extend_to_leaf, resolve_active_path, trace_to_root, ActivePath};
pub use tree::{Forest, TreeBuilder};
