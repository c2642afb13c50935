use std::path::PathBuf;

use branch_server::logging::init_tracing;
use branch_server::{ServerConfig, StorageKind};
use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "branch-server")]
#[command(about = "Branching chat conversation server")]
#[command(version)]
struct Cli {
    /// Server port (overrides config and BRANCH_CHAT_PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Address to bind
    #[arg(long)]
    bind: Option<String>,

    /// Directory holding the database, event logs and config.json
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Storage backend
    #[arg(long, value_enum)]
    storage: Option<StorageKind>,

    /// Disable the JSONL branch event log
    #[arg(long)]
    no_event_log: bool,

    /// Log filter directive, e.g. "info" or "branch_service=debug"
    #[arg(long, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, env = "BRANCH_CHAT_LOG_JSON", default_value = "false")]
    log_json: bool,
}

impl Cli {
    fn apply(self, config: &mut ServerConfig) {
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(bind) = self.bind {
            config.bind_address = bind;
        }
        if let Some(data_dir) = self.data_dir {
            config.data_dir = data_dir;
        }
        if let Some(storage) = self.storage {
            config.storage = storage;
        }
        if self.no_event_log {
            config.event_log = false;
        }
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref(), cli.log_json);

    let mut config = ServerConfig::load();
    cli.apply(&mut config);

    branch_server::run(config).await
}
