pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod server;
pub mod state;

pub use config::{ServerConfig, StorageKind};
pub use error::AppError;
pub use server::{app_config, run};
pub use state::AppState;
