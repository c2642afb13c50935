use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use branch_core::{Conversation, ConversationId, Message, MessageId, MessageStatus, Role};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};

use crate::error::{StoreError, StoreResult};
use crate::traits::{ConversationStore, MessageStore};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-backed message repository and conversation pointer store.
///
/// Every operation opens its own connection on the blocking pool, so the
/// store is cheap to clone and share between request handlers.
#[derive(Debug, Clone)]
pub struct SqliteBranchStore {
    db_path: PathBuf,
}

impl SqliteBranchStore {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    async fn with_connection<T, F>(&self, func: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> StoreResult<T> + Send + 'static,
    {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = open_connection(&db_path)?;
            func(&mut connection)
        })
        .await
        .map_err(|error| StoreError::Task(error.to_string()))?
    }
}

#[async_trait]
impl MessageStore for SqliteBranchStore {
    async fn init(&self) -> StoreResult<()> {
        self.with_connection(|connection| {
            connection.execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS conversations (
                    id TEXT PRIMARY KEY,
                    owner_id TEXT NOT NULL,
                    current_message_id TEXT,
                    revision INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS messages (
                    id TEXT PRIMARY KEY,
                    conversation_id TEXT NOT NULL,
                    parent_id TEXT,
                    role TEXT NOT NULL,
                    content TEXT NOT NULL,
                    status TEXT NOT NULL DEFAULT 'active',
                    created_at TEXT NOT NULL,
                    FOREIGN KEY(conversation_id) REFERENCES conversations(id) ON DELETE CASCADE,
                    FOREIGN KEY(parent_id) REFERENCES messages(id)
                );

                CREATE INDEX IF NOT EXISTS idx_messages_conversation_parent
                    ON messages(conversation_id, parent_id);
                CREATE INDEX IF NOT EXISTS idx_messages_conversation_created
                    ON messages(conversation_id, created_at);
                CREATE INDEX IF NOT EXISTS idx_conversations_owner
                    ON conversations(owner_id, updated_at);
                "#,
            )?;
            Ok(())
        })
        .await?;

        tracing::debug!(db_path = %self.db_path.display(), "SqliteBranchStore: schema ready");
        Ok(())
    }

    async fn insert_message(&self, message: &Message) -> StoreResult<()> {
        let message = message.clone();

        self.with_connection(move |connection| {
            let tx = connection.transaction()?;
            insert_row(&tx, &message)?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn append_message(&self, message: &Message) -> StoreResult<()> {
        let message = message.clone();

        self.with_connection(move |connection| {
            let tx = connection.transaction()?;
            insert_row(&tx, &message)?;
            tx.execute(
                "UPDATE conversations SET current_message_id = ?1 WHERE id = ?2",
                params![message.id.as_str(), message.conversation_id.as_str()],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn get_message(&self, id: &MessageId) -> StoreResult<Option<Message>> {
        let id = id.clone();

        self.with_connection(move |connection| {
            let row = connection
                .query_row(
                    &format!("{SELECT_MESSAGE} WHERE id = ?1"),
                    params![id.as_str()],
                    MessageRow::from_row,
                )
                .optional()?;
            row.map(MessageRow::into_message).transpose()
        })
        .await
    }

    async fn list_messages(&self, conversation_id: &ConversationId) -> StoreResult<Vec<Message>> {
        let conversation_id = conversation_id.clone();

        let messages = self
            .with_connection(move |connection| {
                let mut statement = connection.prepare(&format!(
                    "{SELECT_MESSAGE} WHERE conversation_id = ?1 ORDER BY created_at, id"
                ))?;
                let rows = statement
                    .query_map(params![conversation_id.as_str()], MessageRow::from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows.into_iter().map(MessageRow::into_message).collect()
            })
            .await?;

        Ok(messages)
    }

    async fn update_status(&self, id: &MessageId, status: MessageStatus) -> StoreResult<()> {
        let id = id.clone();

        self.with_connection(move |connection| {
            let tx = connection.transaction()?;
            let conversation_id: Option<String> = tx
                .query_row(
                    "SELECT conversation_id FROM messages WHERE id = ?1",
                    params![id.as_str()],
                    |row| row.get(0),
                )
                .optional()?;
            let Some(conversation_id) = conversation_id else {
                return Err(StoreError::MessageNotFound(id));
            };

            tx.execute(
                "UPDATE messages SET status = ?1 WHERE id = ?2",
                params![status.as_str(), id.as_str()],
            )?;
            tx.execute(
                "UPDATE conversations SET revision = revision + 1, updated_at = ?1 WHERE id = ?2",
                params![format_timestamp(Utc::now()), conversation_id],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn revision(&self, conversation_id: &ConversationId) -> StoreResult<u64> {
        let conversation_id = conversation_id.clone();

        self.with_connection(move |connection| {
            let revision: Option<i64> = connection
                .query_row(
                    "SELECT revision FROM conversations WHERE id = ?1",
                    params![conversation_id.as_str()],
                    |row| row.get(0),
                )
                .optional()?;
            revision
                .map(|value| value.max(0) as u64)
                .ok_or(StoreError::ConversationNotFound(conversation_id))
        })
        .await
    }
}

#[async_trait]
impl ConversationStore for SqliteBranchStore {
    async fn create_conversation(&self, conversation: &Conversation) -> StoreResult<()> {
        let conversation = conversation.clone();

        self.with_connection(move |connection| {
            connection.execute(
                r#"
                INSERT INTO conversations (
                    id, owner_id, current_message_id, revision, created_at, updated_at
                ) VALUES (?1, ?2, ?3, 0, ?4, ?5)
                "#,
                params![
                    conversation.id.as_str(),
                    conversation.owner_id,
                    conversation.current_message_id.as_ref().map(MessageId::as_str),
                    format_timestamp(conversation.created_at),
                    format_timestamp(conversation.updated_at),
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_conversation(&self, id: &ConversationId) -> StoreResult<Option<Conversation>> {
        let id = id.clone();

        self.with_connection(move |connection| {
            let row = connection
                .query_row(
                    &format!("{SELECT_CONVERSATION} WHERE id = ?1"),
                    params![id.as_str()],
                    ConversationRow::from_row,
                )
                .optional()?;
            row.map(ConversationRow::into_conversation).transpose()
        })
        .await
    }

    async fn list_conversations(&self, owner_id: &str) -> StoreResult<Vec<Conversation>> {
        let owner_id = owner_id.to_string();

        self.with_connection(move |connection| {
            let mut statement = connection.prepare(&format!(
                "{SELECT_CONVERSATION} WHERE owner_id = ?1 ORDER BY updated_at DESC, id"
            ))?;
            let rows = statement
                .query_map(params![owner_id], ConversationRow::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows.into_iter()
                .map(ConversationRow::into_conversation)
                .collect()
        })
        .await
    }

    async fn set_current_message(
        &self,
        id: &ConversationId,
        message_id: Option<&MessageId>,
    ) -> StoreResult<()> {
        let id = id.clone();
        let message_id = message_id.cloned();

        self.with_connection(move |connection| {
            let updated = connection.execute(
                "UPDATE conversations SET current_message_id = ?1, updated_at = ?2 WHERE id = ?3",
                params![
                    message_id.as_ref().map(MessageId::as_str),
                    format_timestamp(Utc::now()),
                    id.as_str()
                ],
            )?;
            if updated == 0 {
                return Err(StoreError::ConversationNotFound(id));
            }
            Ok(())
        })
        .await
    }
}

const SELECT_MESSAGE: &str =
    "SELECT id, conversation_id, parent_id, role, content, status, created_at FROM messages";

const SELECT_CONVERSATION: &str =
    "SELECT id, owner_id, current_message_id, created_at, updated_at FROM conversations";

struct MessageRow {
    id: String,
    conversation_id: String,
    parent_id: Option<String>,
    role: String,
    content: String,
    status: String,
    created_at: String,
}

impl MessageRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            conversation_id: row.get(1)?,
            parent_id: row.get(2)?,
            role: row.get(3)?,
            content: row.get(4)?,
            status: row.get(5)?,
            created_at: row.get(6)?,
        })
    }

    fn into_message(self) -> StoreResult<Message> {
        let role = Role::from_db(&self.role)
            .ok_or_else(|| StoreError::InvalidData(format!("unknown role '{}'", self.role)))?;
        let status = MessageStatus::from_db(&self.status)
            .ok_or_else(|| StoreError::InvalidData(format!("unknown status '{}'", self.status)))?;

        Ok(Message {
            id: MessageId::new(self.id),
            conversation_id: ConversationId::new(self.conversation_id),
            parent_id: self.parent_id.map(MessageId::new),
            role,
            content: self.content,
            created_at: parse_timestamp(&self.created_at)?,
            status,
        })
    }
}

struct ConversationRow {
    id: String,
    owner_id: String,
    current_message_id: Option<String>,
    created_at: String,
    updated_at: String,
}

impl ConversationRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            current_message_id: row.get(2)?,
            created_at: row.get(3)?,
            updated_at: row.get(4)?,
        })
    }

    fn into_conversation(self) -> StoreResult<Conversation> {
        Ok(Conversation {
            id: ConversationId::new(self.id),
            owner_id: self.owner_id,
            current_message_id: self.current_message_id.map(MessageId::new),
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

/// Inserts one message row and bumps the conversation revision.
fn insert_row(tx: &Transaction<'_>, message: &Message) -> StoreResult<()> {
    let exists = tx
        .query_row(
            "SELECT 1 FROM messages WHERE id = ?1",
            params![message.id.as_str()],
            |_| Ok(()),
        )
        .optional()?
        .is_some();
    if exists {
        return Err(StoreError::DuplicateMessage(message.id.clone()));
    }

    let now = format_timestamp(Utc::now());
    let bumped = tx.execute(
        "UPDATE conversations SET revision = revision + 1, updated_at = ?1 WHERE id = ?2",
        params![now, message.conversation_id.as_str()],
    )?;
    if bumped == 0 {
        return Err(StoreError::ConversationNotFound(
            message.conversation_id.clone(),
        ));
    }

    tx.execute(
        r#"
        INSERT INTO messages (
            id, conversation_id, parent_id, role, content, status, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
        params![
            message.id.as_str(),
            message.conversation_id.as_str(),
            message.parent_id.as_ref().map(MessageId::as_str),
            message.role.as_str(),
            message.content,
            message.status.as_str(),
            format_timestamp(message.created_at),
        ],
    )?;
    Ok(())
}

fn open_connection(path: &Path) -> StoreResult<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let connection = Connection::open(path)?;
    connection.busy_timeout(BUSY_TIMEOUT)?;
    connection.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        PRAGMA foreign_keys = ON;
        PRAGMA synchronous = NORMAL;
        "#,
    )?;
    Ok(connection)
}

// Fixed-width so that text ordering in SQL matches chronological ordering.
fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(raw: &str) -> StoreResult<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)?.with_timezone(&Utc))
}
