pub mod analytics;
pub mod auth;
pub mod channel;
pub mod cli;
pub mod control;
pub mod db;
pub mod error;
pub mod models;
pub mod session;
pub mod settings;
pub mod simulator;
mod utils;

use anyhow::{Context, Result};
use clap::Parser;

use cli::{commands, Cli, Commands};
use db::Database;
use settings::{debug_enabled, resolve_data_dir, SettingsStore};

pub use auth::AuthContext;
pub use error::{SessionError, SessionResult};
pub use session::{ControllerConfig, SessionController};

const DB_FILE_NAME: &str = "crampwave.sqlite3";
const SETTINGS_FILE_NAME: &str = "settings.json";

pub fn run() -> Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    let level = if debug_enabled() {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    let cli = Cli::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    runtime.block_on(dispatch(cli))
}

async fn dispatch(cli: Cli) -> Result<()> {
    let data_dir = cli.data_dir.clone().unwrap_or_else(resolve_data_dir);
    let settings = SettingsStore::new(data_dir.join(SETTINGS_FILE_NAME))?;

    let db = if cli.ephemeral {
        Database::in_memory()?
    } else {
        Database::new(data_dir.join(DB_FILE_NAME))?
    };
    log::debug!("crampwave using data dir {}", data_dir.display());

    match cli.command {
        Commands::Session(args) => commands::run_session(db, &settings.current(), args).await,
        Commands::History { owner, range } => commands::show_history(&db, &owner, range).await,
        Commands::Profile { action } => commands::handle_profile(&db, action).await,
        Commands::Settings {
            endpoint,
            device_id,
            reconnect_delay_ms,
        } => commands::edit_settings(&settings, endpoint, device_id, reconnect_delay_ms),
    }
}
