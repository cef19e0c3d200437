mod debug_ui;
mod error;
mod lifecycle;
mod logs;
mod ports;
mod process_manager;
mod registry;
mod supervisor;

pub use debug_ui::DebugUiSupervisor;
pub use error::{Error, Result};
pub use lifecycle::ShutdownHooks;
pub use logs::{LogSink, LogStore, LogStream, STDERR_LOG, STDOUT_LOG};
pub use ports::DebugPortAllocator;
#[cfg(unix)]
pub use process_manager::UnixProcessManager;
pub use process_manager::{BoxStream, CommandSpec, ExitFuture, ProcId, ProcessManager, Spawned};
pub use supervisor::Supervisor;
