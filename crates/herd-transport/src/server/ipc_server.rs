use std::{fmt::Debug, path::PathBuf, sync::Arc};

use bytes::Bytes;
use futures_util::{future::BoxFuture, FutureExt, SinkExt, StreamExt};
use tokio::net::{UnixListener, UnixStream};
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use crate::{
    api::{ErrorKind, HerdApi, HerdMessage, MessageType},
    error::{TransportError, TransportResult},
};

/// Turns a request body into a response body. Failures are encoded as
/// [`HerdApi::Error`].
pub type UnaryHandler<C> = Arc<dyn Fn(HerdApi, C) -> BoxFuture<'static, HerdApi> + Send + Sync>;

pub struct IpcServer<C: Clone + Send + Sync> {
    socket: UnixListener,
    unary_handler: UnaryHandler<C>,
    context: C,
}

impl<C: Clone + Debug + Send + Sync + 'static> Debug for IpcServer<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IpcServer")
            .field("socket", &self.socket)
            .field("context", &self.context)
            .field("unary_handler", &"[fn]")
            .finish()
    }
}

impl<C: Clone + Debug + Send + Sync + 'static> IpcServer<C> {
    /// Create a new IPC server.
    ///
    /// # Errors
    /// Returns a `TransportError` if the Unix socket cannot be bound.
    pub fn new(path: PathBuf, context: C) -> TransportResult<Self> {
        let socket = UnixListener::bind(path).map_err(TransportError::SocketError)?;

        Ok(Self {
            socket,
            unary_handler: Arc::new(|_api: HerdApi, _context: C| {
                async {
                    HerdApi::Error {
                        kind: ErrorKind::Internal,
                        message: "no handler installed".to_owned(),
                    }
                }
                .boxed()
            }),
            context,
        })
    }

    #[must_use]
    pub fn add_unary_handler(mut self, handler: UnaryHandler<C>) -> Self {
        self.unary_handler = handler;
        self
    }

    /// Accept connections until the listener fails. Each connection is served
    /// on its own task, one request at a time.
    pub async fn start(self) {
        loop {
            let stream = match self.socket.accept().await {
                Ok((stream, _)) => stream,
                Err(err) => {
                    tracing::error!("Failed to accept IPC connection: {err}");
                    return;
                }
            };

            let unary_handler = self.unary_handler.clone();
            let context = self.context.clone();
            tokio::spawn(serve_connection(stream, unary_handler, context));
        }
    }
}

async fn serve_connection<C: Clone + Send + Sync + 'static>(
    stream: UnixStream,
    unary_handler: UnaryHandler<C>,
    context: C,
) {
    let (mut sink, mut stream) = Framed::new(stream, LengthDelimitedCodec::new()).split();

    while let Some(Ok(body)) = stream.next().await {
        let message = match serde_json::from_slice::<HerdMessage>(&body) {
            Ok(message) => message,
            Err(err) => {
                tracing::warn!("Dropping malformed IPC frame: {err}");
                continue;
            }
        };
        if message.req_type != MessageType::Request {
            continue;
        }

        let response = HerdMessage {
            id: message.id,
            req_type: MessageType::Response,
            body: (unary_handler)(message.body, context.clone()).await,
        };

        let Ok(serialized_response) = serde_json::to_vec(&response) else {
            continue;
        };
        if let Err(err) = sink.send(Bytes::from(serialized_response)).await {
            tracing::debug!("IPC client went away: {err}");
            return;
        }
    }
}
