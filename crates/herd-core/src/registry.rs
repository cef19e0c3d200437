use std::{
    collections::BTreeMap,
    path::{Component, Path, PathBuf},
};

use herd_types::{ServiceId, ServiceStatus, ServiceView, Timestamp};

use crate::{
    error::{Error, Result},
    logs::LogSink,
    process_manager::ProcId,
};

/// The live child attached to a running service.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ProcessHandle {
    pub proc_id: ProcId,
    pub pid: Option<u32>,
}

#[derive(Debug)]
pub(crate) struct ServiceRecord {
    pub id: ServiceId,
    pub entry_point: String,
    pub status: ServiceStatus,
    pub start: Option<Timestamp>,
    pub kill: Option<Timestamp>,
    pub debug_port: Option<u16>,
    /// Run number of the latest spawn; events from older runs are ignored.
    pub run: u64,
    pub handle: Option<ProcessHandle>,
    pub logs: LogSink,
}

impl ServiceRecord {
    pub fn view(&self) -> ServiceView {
        ServiceView {
            id: self.id,
            entry_point: self.entry_point.clone(),
            status: self.status,
            start: self.start,
            kill: self.kill,
            debug_port: self.debug_port,
        }
    }

    pub fn mark_stopped(&mut self) {
        self.handle = None;
        self.status = ServiceStatus::Stopped;
        self.kill = Some(Timestamp::now());
    }
}

/// In-memory service table. Ids grow monotonically and are never reused.
#[derive(Debug, Default)]
pub struct Registry {
    services: BTreeMap<ServiceId, ServiceRecord>,
    next_id: u64,
}

impl Registry {
    #[must_use]
    pub fn exists(&self, id: ServiceId) -> bool {
        self.services.contains_key(&id)
    }

    /// Reserve the next id.
    pub fn next_id(&mut self) -> ServiceId {
        let id = ServiceId(self.next_id);
        self.next_id += 1;
        id
    }

    pub(crate) fn insert(&mut self, id: ServiceId, entry_point: String, logs: LogSink) {
        self.services.insert(
            id,
            ServiceRecord {
                id,
                entry_point,
                status: ServiceStatus::Stopped,
                start: None,
                kill: None,
                debug_port: None,
                run: 0,
                handle: None,
                logs,
            },
        );
    }

    pub(crate) fn get(&self, id: ServiceId) -> Option<&ServiceRecord> {
        self.services.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: ServiceId) -> Option<&mut ServiceRecord> {
        self.services.get_mut(&id)
    }

    pub(crate) fn remove(&mut self, id: ServiceId) -> Option<ServiceRecord> {
        self.services.remove(&id)
    }

    #[must_use]
    pub fn view(&self, id: ServiceId) -> Option<ServiceView> {
        self.services.get(&id).map(ServiceRecord::view)
    }

    #[must_use]
    pub fn views(&self) -> BTreeMap<ServiceId, ServiceView> {
        self.services
            .iter()
            .map(|(id, record)| (*id, record.view()))
            .collect()
    }

    /// Ids of every service with an attached process.
    #[must_use]
    pub fn running(&self) -> Vec<ServiceId> {
        self.services
            .values()
            .filter(|record| record.handle.is_some())
            .map(|record| record.id)
            .collect()
    }
}

/// Resolve `entry_point` under `services_root` and check that it exists.
///
/// # Errors
/// Returns `Error::Validation` for empty, absolute or escaping paths and for
/// paths that do not exist, `Error::Filesystem` if existence cannot be checked.
pub async fn resolve_entry_point(services_root: &Path, entry_point: &str) -> Result<PathBuf> {
    let invalid = |reason: &str| Error::Validation {
        entry_point: entry_point.to_owned(),
        reason: reason.to_owned(),
    };

    if entry_point.trim().is_empty() {
        return Err(invalid("path is empty"));
    }

    let relative = Path::new(entry_point);
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return Err(invalid("path must stay inside the services root"));
    }

    let path = services_root.join(relative);
    if !tokio::fs::try_exists(&path)
        .await
        .map_err(Error::filesystem(&path))?
    {
        return Err(invalid("entry point doesn't exist"));
    }

    Ok(path)
}
