use std::{io, path::PathBuf};

use herd_types::ServiceId;

use crate::process_manager::ProcId;

pub type Result<R, E = Error> = std::result::Result<R, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid entry point `{entry_point}`: {reason}")]
    Validation { entry_point: String, reason: String },

    #[error("service {0} does not exist")]
    ServiceNotFound(ServiceId),

    #[error("filesystem error at {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to spawn `{command}`: {source}")]
    ProcessSpawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to kill process {id:?}: {source}")]
    ProcessKill {
        id: ProcId,
        #[source]
        source: io::Error,
    },

    #[error("no debug ports left to allocate")]
    DebugPortsExhausted,

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub(crate) fn filesystem(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| Error::Filesystem { path, source }
    }
}
