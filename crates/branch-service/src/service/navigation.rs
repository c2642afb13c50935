use branch_core::{ActivePath, BranchNavigator, ConversationId, MessageId};
use branch_store::BranchEvent;

use super::BranchService;
use crate::caller::CallerContext;
use crate::error::Result;

impl BranchService {
    /// Makes the branch through `target` active and persists its leaf as the
    /// conversation pointer.
    pub async fn switch_branch(
        &self,
        caller: &CallerContext,
        conversation_id: &ConversationId,
        target: &MessageId,
    ) -> Result<ActivePath> {
        let _guard = self.locks.acquire(conversation_id).await;
        self.authorize(caller, conversation_id).await?;
        let forest = self.load_forest(conversation_id).await?;

        let path = BranchNavigator::new(&forest).switch_to(target)?;
        self.persist_switch(conversation_id, target, &path).await?;
        Ok(path)
    }

    /// Moves `offset` siblings away from `message_id` (negative is older),
    /// clamped to the first and last sibling.
    pub async fn switch_sibling(
        &self,
        caller: &CallerContext,
        conversation_id: &ConversationId,
        message_id: &MessageId,
        offset: isize,
    ) -> Result<ActivePath> {
        let _guard = self.locks.acquire(conversation_id).await;
        self.authorize(caller, conversation_id).await?;
        let forest = self.load_forest(conversation_id).await?;

        let navigator = BranchNavigator::new(&forest);
        let path = navigator.switch_relative(message_id, offset)?;
        let index = navigator.sibling_info(message_id)?.index as isize;
        tracing::debug!(
            conversation_id = %conversation_id,
            message_id = %message_id,
            from = index,
            offset,
            "BranchService: sibling navigation"
        );

        let target = path
            .ids()
            .iter()
            .find(|id| forest.parent_of(id) == forest.parent_of(message_id))
            .cloned()
            .unwrap_or_else(|| message_id.clone());
        self.persist_switch(conversation_id, &target, &path).await?;
        Ok(path)
    }

    async fn persist_switch(
        &self,
        conversation_id: &ConversationId,
        target: &MessageId,
        path: &ActivePath,
    ) -> Result<()> {
        self.store
            .set_current_message(conversation_id, path.leaf())
            .await?;
        self.record(
            conversation_id,
            BranchEvent::BranchSwitched {
                target_id: target.clone(),
                leaf_id: path.leaf().cloned(),
            },
        )
        .await;

        tracing::info!(
            conversation_id = %conversation_id,
            target_id = %target,
            leaf_id = ?path.leaf().map(MessageId::as_str),
            "BranchService: branch switched"
        );
        Ok(())
    }
}
