mod control;
mod daemon;
mod debug_ui;
mod services;

use std::{path::Path, time::Duration};

use anyhow::{anyhow, Result};
use herd_daemon::DaemonRunner;
use herd_transport::client::ipc_client::IpcClient;

pub use control::{ping, shutdown};
pub use daemon::daemon;
pub use debug_ui::debug_ui;
pub use services::{deregister, inspect, list, register, start, stop};

const SPAWN_TIMEOUT: Duration = Duration::from_secs(5);
const SPAWN_POLL: Duration = Duration::from_millis(50);

/// Connect to the daemon, spawning it first if nothing listens on the socket.
async fn connect(config: &Path, system: &Path) -> Result<IpcClient> {
    let daemon_runner = DaemonRunner::new(system.to_path_buf());
    let socket = daemon_runner.socket_path();

    if IpcClient::check_socket(&socket).await {
        tracing::debug!("Daemon already running");
    } else {
        tracing::debug!("Starting daemon");
        daemon_runner.spawn(config).map_err(|err| anyhow!(err))?;

        tokio::time::timeout(SPAWN_TIMEOUT, async {
            while !IpcClient::check_socket(&socket).await {
                tokio::time::sleep(SPAWN_POLL).await;
            }
        })
        .await
        .map_err(|_| {
            anyhow!(
                "daemon did not start, see {}",
                system.join(herd_daemon::LOG_FILE).display()
            )
        })?;
    }

    Ok(IpcClient::new(&socket).await?)
}

/// Connect to a daemon that is expected to be running already.
async fn connect_existing(system: &Path) -> Result<Option<IpcClient>> {
    let socket = DaemonRunner::new(system.to_path_buf()).socket_path();
    if !IpcClient::check_socket(&socket).await {
        return Ok(None);
    }

    Ok(Some(IpcClient::new(&socket).await?))
}
