use std::sync::Arc;

use anyhow::Context;
use branch_service::{BranchService, BranchServiceConfig, HistoryView};
use branch_store::{
    BranchStore, EventLog, InMemoryBranchStore, JsonlEventLog, MessageStore, NoopEventLog,
    SqliteBranchStore,
};

use crate::config::{ServerConfig, StorageKind};

pub struct AppState {
    pub service: Arc<BranchService>,
    pub default_history_view: HistoryView,
}

impl AppState {
    pub fn new(service: Arc<BranchService>, default_history_view: HistoryView) -> Self {
        Self {
            service,
            default_history_view,
        }
    }

    pub async fn from_config(config: &ServerConfig) -> anyhow::Result<Self> {
        let store: Arc<dyn BranchStore> = match config.storage {
            StorageKind::Sqlite => {
                let db_path = config.database_path();
                tracing::info!(db_path = %db_path.display(), "Initializing SQLite branch store");
                let store = SqliteBranchStore::new(&db_path);
                store
                    .init()
                    .await
                    .with_context(|| format!("failed to initialize {}", db_path.display()))?;
                Arc::new(store)
            }
            StorageKind::Memory => {
                tracing::warn!("Using in-memory branch store; conversations are lost on restart");
                Arc::new(InMemoryBranchStore::new())
            }
        };

        let events: Arc<dyn EventLog> = if config.event_log {
            let events_dir = config.events_dir();
            let log = JsonlEventLog::new(&events_dir);
            log.init()
                .await
                .with_context(|| format!("failed to create {}", events_dir.display()))?;
            Arc::new(log)
        } else {
            Arc::new(NoopEventLog)
        };

        let service = BranchService::new(
            store,
            events,
            BranchServiceConfig {
                forest_cache_size: config.forest_cache_size,
                max_context_messages: config.max_context_messages,
            },
        );

        Ok(Self::new(Arc::new(service), config.default_history_view))
    }
}
