use std::collections::HashMap;

use bytes::{Bytes, BytesMut};
use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::UnixStream,
    select,
    sync::{mpsc, oneshot},
};
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use crate::{
    api::{HerdMessage, MessageType},
    error::{TransportError, TransportResult},
};

pub type IpcWorkerSink<IO = UnixStream> = SplitSink<Framed<IO, LengthDelimitedCodec>, Bytes>;
pub type IpcWorkerStream<IO = UnixStream> = SplitStream<Framed<IO, LengthDelimitedCodec>>;
pub type PendingRequest = (HerdMessage, oneshot::Sender<HerdMessage>);

/// Owns the socket of an [`IpcClient`](super::ipc_client::IpcClient) and
/// routes responses back to their requests by message id.
#[derive(Debug)]
pub struct IpcClientWorker<IO = UnixStream> {
    sink: IpcWorkerSink<IO>,
    stream: IpcWorkerStream<IO>,

    receiver: mpsc::Receiver<PendingRequest>,
    response: HashMap<u32, oneshot::Sender<HerdMessage>>,
}

impl<IO> IpcClientWorker<IO>
where
    IO: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(
        sink: IpcWorkerSink<IO>,
        stream: IpcWorkerStream<IO>,
        receiver: mpsc::Receiver<PendingRequest>,
    ) -> Self {
        Self {
            sink,
            stream,
            receiver,
            response: HashMap::new(),
        }
    }

    fn handle_socket_message(&mut self, message: &BytesMut) -> TransportResult<()> {
        let message = serde_json::from_slice::<HerdMessage>(message)?;
        if message.req_type != MessageType::Response {
            return Err(TransportError::UnknownMessage);
        }

        if let Some(response) = self.response.remove(&message.id) {
            let _ = response.send(message);
        } else {
            tracing::debug!("Dropping response to unknown request {}", message.id);
        }

        Ok(())
    }

    async fn handle_mpsc_message(
        &mut self,
        message: HerdMessage,
        sender: oneshot::Sender<HerdMessage>,
    ) -> TransportResult<()> {
        let serialized = serde_json::to_vec(&message)?;
        self.response.insert(message.id, sender);
        self.sink.send(Bytes::from(serialized)).await?;
        Ok(())
    }

    /// Pump requests and responses until either side closes.
    ///
    /// # Errors
    /// Returns an error if the socket fails.
    pub async fn run(mut self) -> TransportResult<()> {
        loop {
            select! {
                frame = self.stream.next() => match frame {
                    Some(Ok(frame)) => {
                        if let Err(err) = self.handle_socket_message(&frame) {
                            tracing::warn!("Ignoring IPC frame: {err}");
                        }
                    }
                    Some(Err(err)) => return Err(TransportError::SocketError(err)),
                    None => return Ok(()),
                },
                request = self.receiver.recv() => match request {
                    Some((message, sender)) => self.handle_mpsc_message(message, sender).await?,
                    None => return Ok(()),
                },
            }
        }
    }
}
