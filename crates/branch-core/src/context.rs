//! ContextAssembler: active path -> ordered messages for model invocation
//!
//! Only messages on the given path are ever emitted. The path itself is
//! checked to be one contiguous parent chain starting at a root, so a path
//! stitched together from two branches is rejected instead of leaking the
//! other branch into the model's context.

use crate::error::{BranchError, Result};
use crate::message::{Message, Role};
use crate::path::ActivePath;
use crate::tree::Forest;

/// Maps `path` to message bodies in order, dropping messages that do not
/// contribute to context (deleted, partial).
///
/// A dropped ancestor does not break the chain: its descendants are still
/// reached through its parent link.
pub fn assemble_context(forest: &Forest, path: &ActivePath) -> Result<Vec<Message>> {
    let mut expected_parent = None;
    let mut context = Vec::with_capacity(path.len());

    for id in path.ids() {
        let message = forest.require(id)?;
        if message.parent_id.as_ref() != expected_parent {
            return Err(BranchError::BrokenPath {
                id: id.clone(),
                expected_parent: expected_parent
                    .map(|parent| parent.to_string())
                    .unwrap_or_else(|| "<root>".to_string()),
            });
        }
        expected_parent = Some(id);

        if message.status.contributes_to_context() {
            context.push(message.clone());
        }
    }

    Ok(context)
}

/// Like [`assemble_context`] but keeps at most `max_messages` of the
/// conversation tail. Leading system messages are always kept and do not
/// count against the limit.
pub fn assemble_context_with_limit(
    forest: &Forest,
    path: &ActivePath,
    max_messages: usize,
) -> Result<Vec<Message>> {
    let mut context = assemble_context(forest, path)?;
    let system_count = context
        .iter()
        .take_while(|message| message.role == Role::System)
        .count();

    let conversation_len = context.len() - system_count;
    if conversation_len > max_messages {
        context.drain(system_count..system_count + (conversation_len - max_messages));
    }
    Ok(context)
}
