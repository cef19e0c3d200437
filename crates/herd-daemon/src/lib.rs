mod handler;

use std::{
    fs::File,
    path::{Path, PathBuf},
    process::Stdio,
    sync::Arc,
};

use futures_util::FutureExt;
use herd_config::Config;
use herd_core::ShutdownHooks;
use herd_transport::{
    api::HerdApi,
    client::ipc_client::IpcClient,
    server::ipc_server::IpcServer,
};
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;

use crate::handler::{unary_handler, Context};

pub const SOCKET_FILE: &str = "herd.sock";
pub const LOG_FILE: &str = "daemon.log";

#[derive(Debug)]
pub struct DaemonRunner {
    system: PathBuf,
}

impl DaemonRunner {
    #[must_use]
    pub fn new(system: PathBuf) -> Self {
        DaemonRunner { system }
    }

    /// Prepare the system directory.
    ///
    /// # Errors
    /// Returns an error if the system directory cannot be prepared.
    pub fn prepare(&self) -> Result<(), String> {
        std::fs::create_dir_all(&self.system)
            .map_err(|err| format!("Cannot create system directory: {err:?}"))
    }

    /// Clear the system directory.
    ///
    /// # Errors
    /// Returns an error if the system directory cannot be cleared.
    pub fn clear(&self) -> Result<(), String> {
        if std::fs::exists(&self.system)
            .map_err(|err| format!("Cannot clear system directory: {err:?}"))?
        {
            std::fs::remove_dir_all(&self.system)
                .map_err(|err| format!("Cannot remove system directory: {err:?}"))?;
        }

        Ok(())
    }

    /// Get the socket path.
    #[must_use]
    pub fn socket_path(&self) -> PathBuf {
        self.system.join(SOCKET_FILE)
    }

    /// Spawn a detached daemon process running the current executable. Its
    /// output goes to `daemon.log` in the system directory.
    ///
    /// # Errors
    /// Returns an error if the daemon process cannot be spawned.
    pub fn spawn(&self, config: &Path) -> Result<(), String> {
        self.prepare()?;

        let exe = std::env::current_exe()
            .map_err(|err| format!("Cannot locate current executable: {err:?}"))?;
        let log = File::create(self.system.join(LOG_FILE))
            .map_err(|err| format!("Cannot create daemon log: {err:?}"))?;
        let log_err = log
            .try_clone()
            .map_err(|err| format!("Cannot create daemon log: {err:?}"))?;

        std::process::Command::new(exe)
            .arg("--config")
            .arg(config)
            .arg("--system-dir")
            .arg(&self.system)
            .arg("daemon")
            .stdin(Stdio::null())
            .stdout(log)
            .stderr(log_err)
            .spawn()
            .map_err(|err| format!("Cannot spawn daemon process: {err:?}"))?;

        Ok(())
    }

    /// Bind the socket, removing a leftover from a daemon that died without
    /// cleaning up.
    async fn bind(&self, context: Context) -> Result<IpcServer<Context>, String> {
        let socket = self.socket_path();
        if std::fs::exists(&socket).map_err(|err| format!("Cannot inspect socket: {err:?}"))? {
            if IpcClient::check_socket(&socket).await {
                return Err(format!("A daemon is already listening on {}", socket.display()));
            }
            tracing::warn!("Removing stale socket {}", socket.display());
            std::fs::remove_file(&socket)
                .map_err(|err| format!("Cannot remove stale socket: {err:?}"))?;
        }

        let handler = Arc::new(|api: HerdApi, context: Context| unary_handler(api, context).boxed());
        let server = IpcServer::<Context>::new(socket, context)
            .map_err(|err| format!("Cannot start IPC Server: {err:?}"))?
            .add_unary_handler(handler);

        Ok(server)
    }

    /// Serve requests until a shutdown request, SIGINT or SIGTERM, then run
    /// the shutdown hooks and remove the socket.
    ///
    /// # Errors
    /// Returns an error if the daemon process cannot be started.
    #[tracing::instrument(skip_all)]
    pub async fn start(&self, config: &Config) -> Result<(), String> {
        tracing::info!("Starting daemon process...");
        self.prepare()?;

        let mut sigterm = signal(SignalKind::terminate())
            .map_err(|err| format!("Cannot install SIGTERM handler: {err:?}"))?;

        let hooks = ShutdownHooks::new();
        let shutdown = CancellationToken::new();
        let context = Context::new(config, &hooks, shutdown.clone());
        tracing::debug!("Supervisor created");

        let server = self.bind(context).await?;
        tracing::info!("Listening on {}", self.socket_path().display());

        tokio::select! {
            () = server.start() => tracing::error!("IPC server stopped"),
            () = shutdown.cancelled() => tracing::info!("Stopping daemon"),
            _ = tokio::signal::ctrl_c() => tracing::info!("Received SIGINT"),
            _ = sigterm.recv() => tracing::info!("Received SIGTERM"),
        }

        hooks.run().await;

        if let Err(err) = std::fs::remove_file(self.socket_path()) {
            tracing::warn!("Cannot remove socket: {err}");
        }
        tracing::info!("Daemon stopped");

        Ok(())
    }
}
