use crate::api::ErrorKind;

pub type TransportResult<T, E = TransportError> = Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("unexpected message")]
    UnknownMessage,

    #[error("socket error: {0}")]
    SocketError(#[from] std::io::Error),

    #[error("send error: {0}")]
    SendError(String),

    #[error("{message}")]
    Remote { kind: ErrorKind, message: String },
}
