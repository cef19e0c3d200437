use std::collections::BTreeMap;

use herd_types::{ServiceId, ServiceView};
use tokio::sync::oneshot;

use crate::error::Result;

pub type Reply<T> = oneshot::Sender<T>;

#[derive(Debug)]
pub enum SupervisorCommand {
    Exists {
        id: ServiceId,
        reply: Reply<bool>,
    },
    Register {
        entry_point: String,
        reply: Reply<Result<ServiceId>>,
    },
    List {
        reply: Reply<BTreeMap<ServiceId, ServiceView>>,
    },
    Get {
        id: ServiceId,
        reply: Reply<Result<ServiceView>>,
    },
    Spawn {
        id: ServiceId,
        reply: Reply<Result<()>>,
    },
    Kill {
        id: ServiceId,
        reply: Reply<()>,
    },
    Remove {
        id: ServiceId,
        reply: Reply<()>,
    },
    /// Posted by the exit watcher of run `run` of service `id`.
    Exited {
        id: ServiceId,
        run: u64,
        code: Option<i32>,
    },
    Shutdown {
        reply: Reply<()>,
    },
}
