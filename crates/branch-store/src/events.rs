use std::path::{Path, PathBuf};

use async_trait::async_trait;
use branch_core::{ConversationId, MessageId, Role};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::error::StoreResult;

/// Something that changed the shape of a conversation or where it points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BranchEvent {
    ConversationCreated {
        owner_id: String,
    },

    /// `forked` is set when the parent already had children before this one.
    MessageAppended {
        message_id: MessageId,
        parent_id: Option<MessageId>,
        role: Role,
        forked: bool,
    },

    BranchSwitched {
        target_id: MessageId,
        leaf_id: Option<MessageId>,
    },

    MessageDeleted {
        message_id: MessageId,
    },

    ReplyCancelled {
        parent_id: MessageId,
        partial_message_id: Option<MessageId>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub conversation_id: ConversationId,
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub event: BranchEvent,
}

impl EventRecord {
    pub fn now(conversation_id: ConversationId, event: BranchEvent) -> Self {
        Self {
            conversation_id,
            at: Utc::now(),
            event,
        }
    }
}

#[async_trait]
pub trait EventLog: Send + Sync {
    async fn append_event(&self, record: &EventRecord) -> StoreResult<()>;
    async fn load_events(&self, conversation_id: &ConversationId) -> StoreResult<Vec<EventRecord>>;
}

/// One `<conversation_id>.jsonl` file per conversation under `base_path`.
#[derive(Debug, Clone)]
pub struct JsonlEventLog {
    base_path: PathBuf,
}

impl JsonlEventLog {
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    pub async fn init(&self) -> StoreResult<()> {
        fs::create_dir_all(&self.base_path).await?;
        Ok(())
    }

    fn events_path(&self, conversation_id: &ConversationId) -> PathBuf {
        self.base_path
            .join(format!("{}.jsonl", conversation_id.as_str()))
    }
}

#[async_trait]
impl EventLog for JsonlEventLog {
    async fn append_event(&self, record: &EventRecord) -> StoreResult<()> {
        let path = self.events_path(&record.conversation_id);
        let json = serde_json::to_string(record)?;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        file.write_all(json.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.flush().await?;
        Ok(())
    }

    async fn load_events(&self, conversation_id: &ConversationId) -> StoreResult<Vec<EventRecord>> {
        let path = self.events_path(conversation_id);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let file = fs::File::open(path).await?;
        let mut lines = BufReader::new(file).lines();
        let mut events = Vec::new();

        while let Some(line) = lines.next_line().await? {
            match serde_json::from_str(&line) {
                Ok(record) => events.push(record),
                Err(error) => {
                    tracing::warn!(
                        conversation_id = %conversation_id,
                        error = %error,
                        "JsonlEventLog: skipping unreadable line"
                    );
                }
            }
        }

        Ok(events)
    }
}

/// Event sink that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEventLog;

#[async_trait]
impl EventLog for NoopEventLog {
    async fn append_event(&self, _record: &EventRecord) -> StoreResult<()> {
        Ok(())
    }

    async fn load_events(
        &self,
        _conversation_id: &ConversationId,
    ) -> StoreResult<Vec<EventRecord>> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn record_serializes_with_flat_type_tag() {
        let record = EventRecord::now(
            ConversationId::new("c1"),
            BranchEvent::MessageDeleted {
                message_id: MessageId::new("m1"),
            },
        );
        let value = serde_json::to_value(&record).expect("serialize");
        assert_eq!(value["type"], "message_deleted");
        assert_eq!(value["conversation_id"], "c1");
        assert_eq!(value["message_id"], "m1");
    }

    #[tokio::test]
    async fn append_then_load_skips_corrupt_lines() {
        let dir = tempdir().expect("tempdir");
        let log = JsonlEventLog::new(dir.path());
        log.init().await.expect("init");

        let conversation_id = ConversationId::new("c1");
        let first = EventRecord::now(
            conversation_id.clone(),
            BranchEvent::ConversationCreated {
                owner_id: "alice".to_string(),
            },
        );
        log.append_event(&first).await.expect("append");

        let path = dir.path().join("c1.jsonl");
        let mut raw = std::fs::read_to_string(&path).expect("read");
        raw.push_str("{not json\n");
        std::fs::write(&path, raw).expect("write");

        let second = EventRecord::now(
            conversation_id.clone(),
            BranchEvent::BranchSwitched {
                target_id: MessageId::new("m2"),
                leaf_id: Some(MessageId::new("m3")),
            },
        );
        log.append_event(&second).await.expect("append");

        let events = log.load_events(&conversation_id).await.expect("load");
        assert_eq!(events, vec![first, second]);
    }

    #[tokio::test]
    async fn missing_log_loads_empty() {
        let dir = tempdir().expect("tempdir");
        let log = JsonlEventLog::new(dir.path());
        let events = log
            .load_events(&ConversationId::new("nobody"))
            .await
            .expect("load");
        assert!(events.is_empty());
    }
}
