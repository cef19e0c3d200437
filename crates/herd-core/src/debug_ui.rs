//! Supervision of the auxiliary web inspector.
//!
//! At most one inspector runs per manager. It is restarted after every
//! unexpected exit until its restart budget is spent, and killed through the
//! host's [`ShutdownHooks`] when the manager exits.

use std::sync::Arc;

use futures::StreamExt;
use herd_config::Config;
use tokio::{sync::Mutex, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::{
    error::Result,
    lifecycle::ShutdownHooks,
    process_manager::{BoxStream, CommandSpec, ProcessManager, Spawned},
};

#[derive(Debug)]
struct Monitor {
    stop: CancellationToken,
    task: JoinHandle<()>,
}

#[derive(Debug)]
pub struct DebugUiSupervisor<P: ProcessManager> {
    process_manager: Arc<Mutex<P>>,
    spec: CommandSpec,
    web_port: u16,
    max_restarts: u32,
    hooks: ShutdownHooks,
    monitor: Option<Monitor>,
}

impl<P: ProcessManager + 'static> DebugUiSupervisor<P> {
    pub fn new(process_manager: P, config: &Config, hooks: ShutdownHooks) -> Self {
        Self {
            process_manager: Arc::new(Mutex::new(process_manager)),
            spec: Self::command(config),
            web_port: config.inspector.web_port,
            max_restarts: config.inspector.max_restarts,
            hooks,
            monitor: None,
        }
    }

    fn command(config: &Config) -> CommandSpec {
        let inspector = &config.inspector;
        CommandSpec {
            name: "inspector".to_owned(),
            cmd: vec![
                config.interpreter.clone(),
                inspector.program.to_string_lossy().into_owned(),
                "--web-port".to_owned(),
                inspector.web_port.to_string(),
                "--save-live-edit".to_owned(),
                inspector.save_live_edit.to_string(),
            ],
            cwd: None,
            env: vec![],
        }
    }

    /// Whether an inspector is currently supervised.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.monitor
            .as_ref()
            .is_some_and(|monitor| !monitor.task.is_finished())
    }

    /// Start the inspector unless it is already running.
    ///
    /// # Errors
    /// Returns an error if the first spawn is refused by the OS.
    pub async fn start(&mut self) -> Result<()> {
        if self.is_running() {
            tracing::info!("Debug server was already started");
            return Ok(());
        }

        tracing::info!("Starting debug server on port {}...", self.web_port);
        let spawned = self.process_manager.lock().await.spawn(self.spec.clone()).await?;

        let stop = CancellationToken::new();
        let stopped = CancellationToken::new();
        let task = tokio::spawn(supervise(
            Arc::clone(&self.process_manager),
            self.spec.clone(),
            self.max_restarts,
            spawned,
            stop.clone(),
            stopped.clone(),
        ));

        {
            let stop = stop.clone();
            self.hooks.register("debug-ui", move || async move {
                stop.cancel();
                stopped.cancelled().await;
            });
        }

        self.monitor = Some(Monitor { stop, task });
        Ok(())
    }

    /// Kill the inspector and forget it. No-op if none is running.
    pub async fn shutdown(&mut self) {
        let Some(monitor) = self.monitor.take() else {
            return;
        };
        if monitor.task.is_finished() {
            return;
        }

        tracing::info!("Killing debug server");
        monitor.stop.cancel();
        if let Err(err) = monitor.task.await {
            tracing::error!("Debug server monitor failed: {err}");
        }
    }
}

fn forward(pid: Option<u32>, mut output: BoxStream<Vec<u8>>) {
    tokio::spawn(async move {
        while let Some(chunk) = output.next().await {
            let text = String::from_utf8_lossy(&chunk);
            tracing::info!(target: "herd::inspector", pid = ?pid, "inspector > {}", text.trim_end());
        }
    });
}

async fn supervise<P: ProcessManager>(
    process_manager: Arc<Mutex<P>>,
    spec: CommandSpec,
    max_restarts: u32,
    mut spawned: Spawned,
    stop: CancellationToken,
    stopped: CancellationToken,
) {
    let _stopped = stopped.drop_guard();
    let mut restarts = 0;

    loop {
        let Spawned {
            id,
            pid,
            stdout,
            stderr,
            exit,
        } = spawned;
        forward(pid, stdout);
        forward(pid, stderr);

        tokio::select! {
            biased;

            () = stop.cancelled() => {
                if let Err(err) = process_manager.lock().await.kill(id).await {
                    tracing::error!("Failed to kill debug server: {err}");
                }
                return;
            }
            code = exit => {
                tracing::warn!("Debug server exited unexpectedly (code {code:?})");
                if restarts >= max_restarts {
                    tracing::error!("Debug server restarted {restarts} times, giving up");
                    return;
                }
                restarts += 1;

                match process_manager.lock().await.spawn(spec.clone()).await {
                    Ok(next) => {
                        tracing::info!("Debug server was restarted automatically");
                        spawned = next;
                    }
                    Err(err) => {
                        tracing::error!("Failed to restart debug server: {err}");
                        return;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use herd_config::InspectorConfig;

    use crate::process_manager::{MockProcessManager, ProcId};

    use super::*;

    fn config(max_restarts: u32) -> Config {
        Config {
            inspector: InspectorConfig {
                max_restarts,
                ..InspectorConfig::default()
            },
            ..Config::default()
        }
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[test]
    fn test_command() {
        let spec = DebugUiSupervisor::<MockProcessManager>::command(&Config::default());
        assert_eq!(
            spec.cmd,
            vec![
                "node",
                "./node_modules/node-inspector/bin/inspector.js",
                "--web-port",
                "8080",
                "--save-live-edit",
                "true"
            ]
        );
    }

    #[tokio::test]
    async fn test_start_twice_spawns_once() {
        let pm = MockProcessManager::default();
        let mut debug_ui = DebugUiSupervisor::new(pm.clone(), &config(3), ShutdownHooks::new());

        debug_ui.start().await.unwrap();
        debug_ui.start().await.unwrap();

        assert!(debug_ui.is_running());
        assert_eq!(pm.specs().len(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_kills_and_clears() {
        let pm = MockProcessManager::default();
        let mut debug_ui = DebugUiSupervisor::new(pm.clone(), &config(3), ShutdownHooks::new());

        debug_ui.shutdown().await;
        assert!(pm.killed().is_empty());

        debug_ui.start().await.unwrap();
        debug_ui.shutdown().await;

        assert!(!debug_ui.is_running());
        assert_eq!(pm.killed(), vec![ProcId(0)]);

        debug_ui.start().await.unwrap();
        assert!(debug_ui.is_running());
        assert_eq!(pm.specs().len(), 2);
    }

    #[tokio::test]
    async fn test_restarts_until_budget_is_spent() {
        let pm = MockProcessManager::default();
        let mut debug_ui = DebugUiSupervisor::new(pm.clone(), &config(2), ShutdownHooks::new());
        debug_ui.start().await.unwrap();

        pm.exit(ProcId(0), Some(1));
        wait_until(|| pm.specs().len() == 2).await;
        pm.exit(ProcId(1), None);
        wait_until(|| pm.specs().len() == 3).await;
        assert!(debug_ui.is_running());

        pm.exit(ProcId(2), Some(1));
        wait_until(|| !debug_ui.is_running()).await;
        assert_eq!(pm.specs().len(), 3);
    }

    #[tokio::test]
    async fn test_shutdown_hook_kills_inspector() {
        let pm = MockProcessManager::default();
        let hooks = ShutdownHooks::new();
        let mut debug_ui = DebugUiSupervisor::new(pm.clone(), &config(3), hooks.clone());
        debug_ui.start().await.unwrap();

        hooks.run().await;

        assert_eq!(pm.killed(), vec![ProcId(0)]);
        wait_until(|| !debug_ui.is_running()).await;
    }
}
