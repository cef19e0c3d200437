use std::collections::BTreeMap;

use herd_types::{ServiceId, ServiceLogs, ServiceView};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HerdMessage {
    pub id: u32,
    pub req_type: MessageType,
    pub body: HerdApi,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Copy)]
pub enum MessageType {
    Request,
    Response,
}

/// Failure categories reported back to callers.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Filesystem,
    Spawn,
    Internal,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub enum HerdApi {
    Ping,
    Pong,

    Register { entry_point: String },
    Registered { id: ServiceId },
    List,
    Services { services: BTreeMap<ServiceId, ServiceView> },
    Inspect { id: ServiceId },
    Inspection(ServiceLogs),
    Start { id: ServiceId },
    Stop { id: ServiceId },
    Deregister { id: ServiceId },

    DebugUiStart,
    DebugUiStop,

    Shutdown,

    Ok,
    Error { kind: ErrorKind, message: String },
}
