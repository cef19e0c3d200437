use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::{DEFAULT_CONFIG_FILE, DEFAULT_SYSTEM_DIR};

/// CLI for herd
#[derive(Parser, Debug)]
#[command(name = "herd", version, about = "Local process supervisor")]
pub struct Cli {
    /// Configuration file (TOML). Defaults apply when it does not exist
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Directory holding the daemon socket
    #[arg(long, global = true, default_value = DEFAULT_SYSTEM_DIR)]
    pub system_dir: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the daemon in the foreground
    Daemon,

    /// Register an entry point, relative to the services root
    Register { entry_point: String },

    /// List registered services
    List,

    /// Show a service and the output of its latest run
    Inspect { id: u64 },

    /// Spawn a service, restarting it if it is running
    Start { id: u64 },

    /// Kill a running service
    Stop { id: u64 },

    /// Stop and forget a service. Its logs are kept
    Deregister { id: u64 },

    /// Control the web inspector
    DebugUi {
        #[command(subcommand)]
        action: DebugUiAction,
    },

    /// Check whether the daemon is up
    Ping,

    /// Stop every service and the daemon
    Shutdown,
}

#[derive(Subcommand, Debug, Clone, Copy)]
pub enum DebugUiAction {
    Start,
    Stop,
}
