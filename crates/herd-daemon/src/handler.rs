use std::sync::Arc;

use herd_config::Config;
use herd_core::{DebugUiSupervisor, Error, ShutdownHooks, Supervisor, UnixProcessManager};
use herd_transport::api::{ErrorKind, HerdApi};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub(crate) struct Context {
    supervisor: Arc<Supervisor>,
    debug_ui: Arc<Mutex<DebugUiSupervisor<UnixProcessManager>>>,
    shutdown: CancellationToken,
}

impl Context {
    /// Build the daemon state. The services are stopped by the `services`
    /// hook; the inspector registers its own hook when started.
    pub(crate) fn new(config: &Config, hooks: &ShutdownHooks, shutdown: CancellationToken) -> Self {
        let supervisor = Arc::new(Supervisor::new(UnixProcessManager::new(), config));
        {
            let supervisor = Arc::clone(&supervisor);
            hooks.register("services", move || async move {
                if let Err(err) = supervisor.shutdown().await {
                    tracing::error!("Failed to stop services: {err}");
                }
            });
        }

        let debug_ui = DebugUiSupervisor::new(UnixProcessManager::new(), config, hooks.clone());

        Context {
            supervisor,
            debug_ui: Arc::new(Mutex::new(debug_ui)),
            shutdown,
        }
    }
}

fn error_kind(err: &Error) -> ErrorKind {
    match err {
        Error::Validation { .. } => ErrorKind::Validation,
        Error::ServiceNotFound(_) => ErrorKind::NotFound,
        Error::Filesystem { .. } => ErrorKind::Filesystem,
        Error::ProcessSpawn { .. } | Error::ProcessKill { .. } => ErrorKind::Spawn,
        Error::DebugPortsExhausted | Error::Internal(_) => ErrorKind::Internal,
    }
}

fn reply<T>(result: herd_core::Result<T>, ok: impl FnOnce(T) -> HerdApi) -> HerdApi {
    match result {
        Ok(value) => ok(value),
        Err(err) => {
            tracing::warn!("Request failed: {err}");
            HerdApi::Error {
                kind: error_kind(&err),
                message: err.to_string(),
            }
        }
    }
}

pub(crate) async fn unary_handler(message: HerdApi, context: Context) -> HerdApi {
    tracing::debug!("Handling {message:?}");

    match message {
        HerdApi::Ping => HerdApi::Pong,
        HerdApi::Register { entry_point } => reply(
            context.supervisor.register(entry_point).await,
            |id| HerdApi::Registered { id },
        ),
        HerdApi::List => reply(context.supervisor.list().await, |services| {
            HerdApi::Services { services }
        }),
        HerdApi::Inspect { id } => reply(
            context.supervisor.get_with_logs(id).await,
            HerdApi::Inspection,
        ),
        HerdApi::Start { id } => reply(context.supervisor.spawn(id).await, |()| HerdApi::Ok),
        HerdApi::Stop { id } => reply(context.supervisor.kill(id).await, |()| HerdApi::Ok),
        HerdApi::Deregister { id } => {
            reply(context.supervisor.remove(id).await, |()| HerdApi::Ok)
        }
        HerdApi::DebugUiStart => {
            reply(context.debug_ui.lock().await.start().await, |()| HerdApi::Ok)
        }
        HerdApi::DebugUiStop => {
            context.debug_ui.lock().await.shutdown().await;
            HerdApi::Ok
        }
        HerdApi::Shutdown => {
            tracing::info!("Shutdown requested");
            context.shutdown.cancel();
            HerdApi::Ok
        }
        other => HerdApi::Error {
            kind: ErrorKind::Internal,
            message: format!("unexpected request {other:?}"),
        },
    }
}
