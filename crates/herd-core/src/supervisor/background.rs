use std::path::PathBuf;

use futures::StreamExt;
use herd_config::Config;
use herd_types::{ServiceId, ServiceStatus, Timestamp};
use tokio::sync::mpsc;

use crate::{
    error::{Error, Result},
    logs::{LogSink, LogStore, LogStream},
    ports::DebugPortAllocator,
    process_manager::{BoxStream, CommandSpec, ExitFuture, ProcessManager},
    registry::{resolve_entry_point, ProcessHandle, Registry},
    supervisor::commands::SupervisorCommand,
};

/// Owner of the registry. Every state transition happens on this task.
#[derive(Debug)]
pub struct SupervisorBackground<P: ProcessManager> {
    process_manager: P,
    registry: Registry,
    logs: LogStore,
    ports: DebugPortAllocator,

    services_root: PathBuf,
    interpreter: String,
    debug_flag: String,

    commands_tx: mpsc::Sender<SupervisorCommand>,
    commands_rx: mpsc::Receiver<SupervisorCommand>,
}

impl<P: ProcessManager> SupervisorBackground<P> {
    pub fn new(
        process_manager: P,
        config: &Config,
        commands_tx: mpsc::Sender<SupervisorCommand>,
        commands_rx: mpsc::Receiver<SupervisorCommand>,
    ) -> Self {
        tracing::info!("SupervisorBackground initialized");

        Self {
            process_manager,
            registry: Registry::default(),
            logs: LogStore::new(&config.logs_root),
            ports: DebugPortAllocator::new(config.debug_port_base),
            services_root: config.services_root.clone(),
            interpreter: config.interpreter.clone(),
            debug_flag: config.debug_flag.clone(),
            commands_tx,
            commands_rx,
        }
    }

    pub async fn run(&mut self) {
        tracing::info!("SupervisorBackground started");

        while let Some(command) = self.commands_rx.recv().await {
            tracing::debug!("Received command: {:?}", command);

            let stop = matches!(command, SupervisorCommand::Shutdown { .. });
            self.handle_command(command).await;
            if stop {
                break;
            }
        }

        tracing::info!("SupervisorBackground stopped");
    }

    async fn handle_command(&mut self, command: SupervisorCommand) {
        // A dropped reply receiver only means the caller went away.
        match command {
            SupervisorCommand::Exists { id, reply } => {
                let _ = reply.send(self.registry.exists(id));
            }
            SupervisorCommand::Register { entry_point, reply } => {
                let _ = reply.send(self.register(entry_point).await);
            }
            SupervisorCommand::List { reply } => {
                let _ = reply.send(self.registry.views());
            }
            SupervisorCommand::Get { id, reply } => {
                let _ = reply.send(self.registry.view(id).ok_or(Error::ServiceNotFound(id)));
            }
            SupervisorCommand::Spawn { id, reply } => {
                let _ = reply.send(self.spawn(id).await);
            }
            SupervisorCommand::Kill { id, reply } => {
                self.kill(id).await;
                let _ = reply.send(());
            }
            SupervisorCommand::Remove { id, reply } => {
                self.remove(id).await;
                let _ = reply.send(());
            }
            SupervisorCommand::Exited { id, run, code } => {
                self.exited(id, run, code);
            }
            SupervisorCommand::Shutdown { reply } => {
                self.shutdown().await;
                let _ = reply.send(());
            }
        }
    }

    async fn register(&mut self, entry_point: String) -> Result<ServiceId> {
        resolve_entry_point(&self.services_root, &entry_point).await?;

        let id = self.registry.next_id();
        self.logs.ensure_dir(id).await?;
        self.registry
            .insert(id, entry_point.clone(), self.logs.sink(id));

        tracing::info!("Registered service {id} ({entry_point})");
        Ok(id)
    }

    fn command_for(&self, id: ServiceId, entry_point: &str, port: u16) -> CommandSpec {
        CommandSpec {
            name: format!("service-{}", id.0),
            cmd: vec![
                self.interpreter.clone(),
                format!("{}={port}", self.debug_flag),
                self.services_root
                    .join(entry_point)
                    .to_string_lossy()
                    .into_owned(),
            ],
            cwd: None,
            env: vec![],
        }
    }

    async fn spawn(&mut self, id: ServiceId) -> Result<()> {
        let Some(record) = self.registry.get(id) else {
            return Err(Error::ServiceNotFound(id));
        };

        if record.handle.is_some() {
            tracing::info!("Service {id} is already running, restarting it");
            self.kill(id).await;
        }

        let record = self
            .registry
            .get_mut(id)
            .ok_or(Error::ServiceNotFound(id))?;
        let logs = record.logs.clone();
        let entry_point = record.entry_point.clone();

        let run = logs.reset().await?;
        record.run = run;

        let port = self.ports.allocate()?;
        let spec = self.command_for(id, &entry_point, port);
        tracing::debug!("Spawning service {id}: {:?}", spec.cmd);
        let process = self.process_manager.spawn(spec).await?;

        let record = self
            .registry
            .get_mut(id)
            .ok_or(Error::ServiceNotFound(id))?;
        record.start = Some(Timestamp::now());
        record.status = ServiceStatus::Running;
        record.debug_port = Some(port);
        record.handle = Some(ProcessHandle {
            proc_id: process.id,
            pid: process.pid,
        });

        tracing::info!(
            "Service {id} started (pid {:?}, debug port {port})",
            process.pid
        );

        Self::follow_output(id, process.pid, run, LogStream::Stdout, process.stdout, &logs);
        Self::follow_output(id, process.pid, run, LogStream::Stderr, process.stderr, &logs);
        self.watch_exit(id, run, process.exit);

        Ok(())
    }

    fn follow_output(
        id: ServiceId,
        pid: Option<u32>,
        run: u64,
        stream: LogStream,
        mut output: BoxStream<Vec<u8>>,
        logs: &LogSink,
    ) {
        let logs = logs.clone();
        tokio::spawn(async move {
            while let Some(chunk) = output.next().await {
                match logs.append(run, stream, &chunk).await {
                    Ok(true) => {}
                    Ok(false) => {
                        tracing::debug!("Dropping {} of superseded run of {id}", stream.as_str());
                    }
                    Err(err) => {
                        tracing::warn!("Failed to append {} of {id}: {err}", stream.as_str());
                    }
                }

                let text = String::from_utf8_lossy(&chunk);
                tracing::info!(
                    target: "herd::output",
                    service = %id,
                    pid = ?pid,
                    stream = stream.as_str(),
                    "{}",
                    text.trim_end()
                );
            }
        });
    }

    fn watch_exit(&self, id: ServiceId, run: u64, exit: ExitFuture) {
        let commands_tx = self.commands_tx.clone();
        tokio::spawn(async move {
            let code = exit.await;
            if let Err(err) = commands_tx
                .send(SupervisorCommand::Exited { id, run, code })
                .await
            {
                tracing::error!("Failed to send exit notification of {id}: {err}");
            }
        });
    }

    fn exited(&mut self, id: ServiceId, run: u64, code: Option<i32>) {
        match code {
            Some(0) => tracing::info!("Service {id} exited with code 0"),
            Some(code) => tracing::warn!("Service {id} exited with code {code}"),
            None => tracing::warn!("Service {id} was terminated by a signal"),
        }

        let Some(record) = self.registry.get_mut(id) else {
            tracing::debug!("Service {id} was removed before its process exited");
            return;
        };
        if record.run != run {
            tracing::debug!("Ignoring exit of superseded run {run} of {id}");
            return;
        }
        if record.handle.is_none() {
            tracing::debug!("Service {id} was already stopped");
            return;
        }

        record.mark_stopped();
    }

    async fn kill(&mut self, id: ServiceId) {
        let Some(record) = self.registry.get_mut(id) else {
            return;
        };
        let Some(handle) = record.handle else {
            return;
        };

        tracing::info!("Killing service {id} (pid {:?})", handle.pid);
        record.mark_stopped();

        if let Err(err) = self.process_manager.kill(handle.proc_id).await {
            tracing::error!("Failed to kill service {id}: {err}");
        }
    }

    async fn remove(&mut self, id: ServiceId) {
        if !self.registry.exists(id) {
            return;
        }

        self.kill(id).await;
        self.registry.remove(id);
        tracing::info!("Removed service {id}");
    }

    async fn shutdown(&mut self) {
        tracing::info!("Stopping all services");

        for id in self.registry.running() {
            self.kill(id).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::process_manager::MockProcessManager;

    use super::*;

    fn background(config: &Config) -> SupervisorBackground<MockProcessManager> {
        let (commands_tx, commands_rx) = mpsc::channel(8);
        SupervisorBackground::new(MockProcessManager::default(), config, commands_tx, commands_rx)
    }

    #[test]
    fn test_command_for() {
        let config = Config {
            services_root: PathBuf::from("/srv"),
            ..Config::default()
        };
        let background = background(&config);

        let spec = background.command_for(ServiceId(7), "./svc/index.js", 5003);
        assert_eq!(spec.name, "service-7");
        assert_eq!(
            spec.cmd,
            vec!["node", "--inspect=5003", "/srv/./svc/index.js"]
        );
    }
}
