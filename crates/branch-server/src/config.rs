use std::path::{Path, PathBuf};

use branch_service::HistoryView;
use serde::{Deserialize, Serialize};

const CONFIG_FILE_PATH: &str = "config.toml";
const CONFIG_JSON_NAME: &str = "config.json";
const DATABASE_FILE_NAME: &str = "branches.db";
const EVENTS_DIR_NAME: &str = "events";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    Sqlite,
    Memory,
}

impl StorageKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Some(Self::Sqlite),
            "memory" | "in-memory" => Some(Self::Memory),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub bind_address: String,
    pub data_dir: PathBuf,
    pub storage: StorageKind,
    /// Write a per-conversation JSONL log of branch events under the data dir.
    pub event_log: bool,
    pub forest_cache_size: usize,
    pub max_context_messages: Option<usize>,
    pub default_history_view: HistoryView,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8090,
            bind_address: "127.0.0.1".to_string(),
            data_dir: default_data_dir(),
            storage: StorageKind::Sqlite,
            event_log: true,
            forest_cache_size: 64,
            max_context_messages: None,
            default_history_view: HistoryView::Tree,
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".branch-chat")
}

fn parse_bool_env(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "y" | "on"
    )
}

impl ServerConfig {
    /// Defaults, then `config.json` in the data dir or `config.toml` in the
    /// working directory, then `BRANCH_CHAT_*` environment variables.
    pub fn load() -> Self {
        let lookup = |key: &str| std::env::var(key).ok();
        let data_dir = lookup("BRANCH_CHAT_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir);

        let json_path = data_dir.join(CONFIG_JSON_NAME);
        let mut config =
            Self::from_files(&json_path, Path::new(CONFIG_FILE_PATH)).unwrap_or_default();
        config.apply_env(lookup);
        config
    }

    /// First readable file wins; a file that fails to parse is skipped.
    pub fn from_files(json_path: &Path, toml_path: &Path) -> Option<Self> {
        if json_path.exists() {
            let parsed = std::fs::read_to_string(json_path)
                .map(|content| serde_json::from_str::<Self>(&content));
            match parsed {
                Ok(Ok(config)) => return Some(config),
                Ok(Err(error)) => tracing::warn!(
                    path = %json_path.display(),
                    error = %error,
                    "ServerConfig: ignoring malformed config file"
                ),
                Err(error) => tracing::warn!(
                    path = %json_path.display(),
                    error = %error,
                    "ServerConfig: cannot read config file"
                ),
            }
        }

        if toml_path.exists() {
            let parsed =
                std::fs::read_to_string(toml_path).map(|content| toml::from_str::<Self>(&content));
            match parsed {
                Ok(Ok(config)) => return Some(config),
                Ok(Err(error)) => tracing::warn!(
                    path = %toml_path.display(),
                    error = %error,
                    "ServerConfig: ignoring malformed config file"
                ),
                Err(error) => tracing::warn!(
                    path = %toml_path.display(),
                    error = %error,
                    "ServerConfig: cannot read config file"
                ),
            }
        }

        None
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let parsed = |key: &str| lookup(key).and_then(|value| value.trim().parse::<usize>().ok());

        if let Some(port) = lookup("BRANCH_CHAT_PORT").and_then(|value| value.trim().parse().ok()) {
            self.port = port;
        }
        if let Some(bind) = lookup("BRANCH_CHAT_BIND") {
            self.bind_address = bind;
        }
        if let Some(data_dir) = lookup("BRANCH_CHAT_DATA_DIR") {
            self.data_dir = PathBuf::from(data_dir);
        }
        let storage = lookup("BRANCH_CHAT_STORAGE");
        if let Some(storage) = storage.as_deref().and_then(StorageKind::parse) {
            self.storage = storage;
        }
        if let Some(event_log) = lookup("BRANCH_CHAT_EVENT_LOG") {
            self.event_log = parse_bool_env(&event_log);
        }
        if let Some(size) = parsed("BRANCH_CHAT_CACHE_SIZE") {
            self.forest_cache_size = size;
        }
        // 0 means no limit.
        if let Some(limit) = parsed("BRANCH_CHAT_MAX_CONTEXT") {
            self.max_context_messages = (limit > 0).then_some(limit);
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILE_NAME)
    }

    pub fn events_dir(&self) -> PathBuf {
        self.data_dir.join(EVENTS_DIR_NAME)
    }
}
