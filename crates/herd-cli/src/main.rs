use anyhow::Result;
use clap::Parser;
use herd_types::ServiceId;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod logger;

use config::{Cli, Commands};

pub const DEFAULT_SYSTEM_DIR: &str = "/tmp/herd";
pub const DEFAULT_CONFIG_FILE: &str = "herd.toml";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let (config, system) = (cli.config.as_path(), cli.system_dir.as_path());

    match cli.command {
        Commands::Daemon => commands::daemon(config, system).await,
        Commands::Register { entry_point } => commands::register(config, system, entry_point).await,
        Commands::List => commands::list(config, system).await,
        Commands::Inspect { id } => commands::inspect(config, system, ServiceId(id)).await,
        Commands::Start { id } => commands::start(config, system, ServiceId(id)).await,
        Commands::Stop { id } => commands::stop(config, system, ServiceId(id)).await,
        Commands::Deregister { id } => commands::deregister(config, system, ServiceId(id)).await,
        Commands::DebugUi { action } => commands::debug_ui(config, system, action).await,
        Commands::Ping => commands::ping(system).await,
        Commands::Shutdown => commands::shutdown(system).await,
    }
}
