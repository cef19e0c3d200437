use std::{collections::BTreeMap, path::Path};

use futures_util::StreamExt;
use herd_types::{ServiceId, ServiceLogs, ServiceView};
use tokio::{
    net::UnixStream,
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use crate::{
    api::{HerdApi, HerdMessage, MessageType},
    client::worker::{IpcClientWorker, PendingRequest},
    error::{TransportError, TransportResult},
};

const BUFFER_SIZE: usize = 100;

#[derive(Debug)]
pub struct IpcClient {
    _task: JoinHandle<()>,
    in_socket: mpsc::Sender<PendingRequest>,
    message_counter: u32,
}

impl IpcClient {
    pub async fn check_socket(path: &Path) -> bool {
        UnixStream::connect(path).await.is_ok()
    }

    /// Create a new IPC client.
    ///
    /// # Errors
    /// If the socket connection fails.
    #[tracing::instrument]
    pub async fn new(path: &Path) -> TransportResult<Self> {
        let socket = UnixStream::connect(path).await.map_err(|err| {
            tracing::error!("Failed to connect to IPC socket: {}", err);
            TransportError::SocketError(err)
        })?;

        let (tx, rx) = mpsc::channel::<PendingRequest>(BUFFER_SIZE);

        let task = tokio::spawn(async move {
            let framed = Framed::new(socket, LengthDelimitedCodec::new());
            let (sink, stream) = framed.split();
            if let Err(err) = IpcClientWorker::new(sink, stream, rx).run().await {
                tracing::error!("IPC connection failed: {err}");
            }
        });

        Ok(Self {
            _task: task,
            in_socket: tx,
            message_counter: 0,
        })
    }

    /// Send a message to the server and wait for its response.
    ///
    /// # Errors
    /// If the message could not be sent or the connection closed first.
    pub async fn send(&mut self, message: HerdApi) -> TransportResult<HerdApi> {
        self.message_counter = self.message_counter.wrapping_add(1);
        let message_id = self.message_counter;

        let (response_tx, response_rx) = oneshot::channel::<HerdMessage>();

        self.in_socket
            .send((
                HerdMessage {
                    id: message_id,
                    req_type: MessageType::Request,
                    body: message,
                },
                response_tx,
            ))
            .await
            .map_err(|err| TransportError::SendError(err.to_string()))?;

        let response = response_rx
            .await
            .map_err(|_| TransportError::SendError("No response".to_string()))?;

        if response.id != message_id || response.req_type != MessageType::Response {
            return Err(TransportError::UnknownMessage);
        }

        Ok(response.body)
    }

    /// Like [`IpcClient::send`], but a [`HerdApi::Error`] reply becomes
    /// [`TransportError::Remote`].
    async fn call(&mut self, message: HerdApi) -> TransportResult<HerdApi> {
        match self.send(message).await? {
            HerdApi::Error { kind, message } => Err(TransportError::Remote { kind, message }),
            body => Ok(body),
        }
    }

    async fn call_ok(&mut self, message: HerdApi) -> TransportResult<()> {
        match self.call(message).await? {
            HerdApi::Ok => Ok(()),
            _ => Err(TransportError::UnknownMessage),
        }
    }

    pub async fn ping(&mut self) -> bool {
        matches!(self.send(HerdApi::Ping).await, Ok(HerdApi::Pong))
    }

    /// Register a service by its entry point.
    ///
    /// # Errors
    /// Returns an error if the entry point is rejected.
    pub async fn register(&mut self, entry_point: impl Into<String>) -> TransportResult<ServiceId> {
        let entry_point = entry_point.into();
        tracing::debug!("Registering {entry_point}");

        match self.call(HerdApi::Register { entry_point }).await? {
            HerdApi::Registered { id } => Ok(id),
            _ => Err(TransportError::UnknownMessage),
        }
    }

    /// # Errors
    /// Returns an error if the daemon cannot be reached.
    pub async fn list(&mut self) -> TransportResult<BTreeMap<ServiceId, ServiceView>> {
        match self.call(HerdApi::List).await? {
            HerdApi::Services { services } => Ok(services),
            _ => Err(TransportError::UnknownMessage),
        }
    }

    /// Fetch the captured output of a service.
    ///
    /// # Errors
    /// Returns an error if the service is unknown or its logs are unreadable.
    pub async fn inspect(&mut self, id: ServiceId) -> TransportResult<ServiceLogs> {
        match self.call(HerdApi::Inspect { id }).await? {
            HerdApi::Inspection(logs) => Ok(logs),
            _ => Err(TransportError::UnknownMessage),
        }
    }

    /// # Errors
    /// Returns an error if the service is unknown or fails to spawn.
    pub async fn start(&mut self, id: ServiceId) -> TransportResult<()> {
        tracing::debug!("Starting service {id}");
        self.call_ok(HerdApi::Start { id }).await
    }

    /// # Errors
    /// Returns an error if the daemon cannot be reached.
    pub async fn stop(&mut self, id: ServiceId) -> TransportResult<()> {
        tracing::debug!("Stopping service {id}");
        self.call_ok(HerdApi::Stop { id }).await
    }

    /// # Errors
    /// Returns an error if the daemon cannot be reached.
    pub async fn deregister(&mut self, id: ServiceId) -> TransportResult<()> {
        self.call_ok(HerdApi::Deregister { id }).await
    }

    /// # Errors
    /// Returns an error if the inspector cannot be spawned.
    pub async fn debug_ui_start(&mut self) -> TransportResult<()> {
        self.call_ok(HerdApi::DebugUiStart).await
    }

    /// # Errors
    /// Returns an error if the daemon cannot be reached.
    pub async fn debug_ui_stop(&mut self) -> TransportResult<()> {
        self.call_ok(HerdApi::DebugUiStop).await
    }

    /// Ask the daemon to stop every service and exit. A connection closed by
    /// the exiting daemon counts as success.
    ///
    /// # Errors
    /// If the request could not be sent.
    pub async fn shutdown(&mut self) -> TransportResult<()> {
        tracing::debug!("Shutting down daemon");

        match self.call(HerdApi::Shutdown).await {
            Ok(_) => Ok(()),
            Err(TransportError::SendError(message)) if message == "No response" => Ok(()),
            Err(err) => Err(err),
        }
    }
}
