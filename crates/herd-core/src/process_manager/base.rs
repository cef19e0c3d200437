use crate::{
    error::Result,
    process_manager::types::{CommandSpec, ProcId, Spawned},
};

/// Operating-system process capability.
#[async_trait::async_trait]
pub trait ProcessManager: Send + Sync {
    /// Spawn a new process.
    ///
    /// Errors the OS reports synchronously are returned here; anything later
    /// surfaces only through [`Spawned::exit`].
    async fn spawn(&mut self, spec: CommandSpec) -> Result<Spawned>;
    /// Forcefully kill a process. Killing a process that already exited is not an error.
    async fn kill(&mut self, id: ProcId) -> Result<()>;
}
