use std::collections::BTreeMap;

use herd_config::Config;
use herd_types::{ServiceId, ServiceLogs, ServiceView};
use tokio::sync::{mpsc, oneshot};

use crate::{
    error::{Error, Result},
    logs::LogStore,
    process_manager::ProcessManager,
    supervisor::{
        background::SupervisorBackground,
        commands::{Reply, SupervisorCommand},
    },
};

/// Handle to the service supervisor task.
#[derive(Debug)]
pub struct Supervisor {
    _task: tokio::task::JoinHandle<()>,
    commands_tx: mpsc::Sender<SupervisorCommand>,
    logs: LogStore,
}

impl Supervisor {
    pub fn new<P: ProcessManager + 'static>(process_manager: P, config: &Config) -> Self {
        let (commands_tx, commands_rx) = mpsc::channel::<SupervisorCommand>(100);
        let mut inner =
            SupervisorBackground::new(process_manager, config, commands_tx.clone(), commands_rx);

        let task = tokio::spawn(async move {
            inner.run().await;
        });

        Self {
            _task: task,
            commands_tx,
            logs: LogStore::new(&config.logs_root),
        }
    }

    async fn request<T>(&self, command: impl FnOnce(Reply<T>) -> SupervisorCommand) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.commands_tx
            .send(command(reply))
            .await
            .map_err(|err| Error::Internal(err.to_string()))?;

        response
            .await
            .map_err(|err| Error::Internal(err.to_string()))
    }

    /// Whether a service with this id is registered.
    ///
    /// # Errors
    /// Returns an error if the supervisor task is gone.
    pub async fn exists(&self, id: ServiceId) -> Result<bool> {
        self.request(|reply| SupervisorCommand::Exists { id, reply })
            .await
    }

    /// Register an entry point (relative to the services root).
    ///
    /// # Errors
    /// `Error::Validation` if the entry point does not exist under the
    /// services root, `Error::Filesystem` if its log directory cannot be created.
    pub async fn register(&self, entry_point: impl Into<String>) -> Result<ServiceId> {
        let entry_point = entry_point.into();
        self.request(|reply| SupervisorCommand::Register { entry_point, reply })
            .await?
    }

    /// Snapshot of every registered service.
    ///
    /// # Errors
    /// Returns an error if the supervisor task is gone.
    pub async fn list(&self) -> Result<BTreeMap<ServiceId, ServiceView>> {
        self.request(|reply| SupervisorCommand::List { reply }).await
    }

    /// # Errors
    /// `Error::ServiceNotFound` if the service is not registered.
    pub async fn get(&self, id: ServiceId) -> Result<ServiceView> {
        self.request(|reply| SupervisorCommand::Get { id, reply })
            .await?
    }

    /// A service together with the output captured since its last spawn.
    ///
    /// # Errors
    /// `Error::ServiceNotFound` if the service is not registered,
    /// `Error::Filesystem` if either log file cannot be read.
    pub async fn get_with_logs(&self, id: ServiceId) -> Result<ServiceLogs> {
        let service = self.get(id).await?;
        let (stdout, stderr) = self.logs.read(id).await?;

        Ok(ServiceLogs {
            service,
            stdout,
            stderr,
        })
    }

    /// Spawn the service's entry point. A running service is killed first.
    ///
    /// # Errors
    /// `Error::ServiceNotFound`, `Error::ProcessSpawn` when the OS refuses the
    /// spawn, `Error::Filesystem` when the logs cannot be truncated.
    pub async fn spawn(&self, id: ServiceId) -> Result<()> {
        self.request(|reply| SupervisorCommand::Spawn { id, reply })
            .await?
    }

    /// Forcefully kill the service's process. No-op if it is not running.
    ///
    /// # Errors
    /// Returns an error if the supervisor task is gone.
    pub async fn kill(&self, id: ServiceId) -> Result<()> {
        self.request(|reply| SupervisorCommand::Kill { id, reply })
            .await
    }

    /// Kill and deregister a service. Its log files are kept.
    ///
    /// # Errors
    /// Returns an error if the supervisor task is gone.
    pub async fn remove(&self, id: ServiceId) -> Result<()> {
        self.request(|reply| SupervisorCommand::Remove { id, reply })
            .await
    }

    /// Kill every running service and stop the supervisor task.
    ///
    /// # Errors
    /// Returns an error if the supervisor task is already gone.
    pub async fn shutdown(&self) -> Result<()> {
        self.request(|reply| SupervisorCommand::Shutdown { reply })
            .await
    }
}
