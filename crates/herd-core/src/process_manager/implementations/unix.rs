use std::{
    collections::HashMap,
    io,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use futures::StreamExt;
use libc::{killpg, setsid, ESRCH, SIGKILL};
use tokio::{io::BufReader, process::Command};
use tokio_util::io::ReaderStream;

use crate::{
    error::{Error, Result},
    process_manager::{
        base::ProcessManager,
        types::{CommandSpec, ProcId, Spawned},
    },
};

type Groups = Arc<Mutex<HashMap<ProcId, libc::pid_t>>>;

fn lock(groups: &Groups) -> MutexGuard<'_, HashMap<ProcId, libc::pid_t>> {
    groups.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Unix-specific process manager.
///
/// Every child becomes the leader of its own process group so that a kill
/// also reaches anything it forked.
#[derive(Debug, Default)]
pub struct UnixProcessManager {
    // Live process groups; an entry is dropped as soon as the child is reaped.
    groups: Groups,
    next_id: u64,
}

impl UnixProcessManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ProcessManager for UnixProcessManager {
    async fn spawn(&mut self, spec: CommandSpec) -> Result<Spawned> {
        let command = spec.cmd.join(" ");
        let spawn_error = |source| Error::ProcessSpawn {
            command: command.clone(),
            source,
        };

        let Some((program, args)) = spec.cmd.split_first() else {
            return Err(spawn_error(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("empty cmd for `{}`", spec.name),
            )));
        };

        let mut cmd = Command::new(program);
        cmd.args(args);
        if let Some(dir) = &spec.cwd {
            cmd.current_dir(dir);
        }
        for (k, v) in &spec.env {
            cmd.env(k, v);
        }

        #[allow(unsafe_code)]
        unsafe {
            cmd.pre_exec(|| {
                if setsid() == -1 {
                    return Err(io::Error::last_os_error());
                }
                Ok(())
            });
        }

        cmd.stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped());

        let mut child = cmd.spawn().map_err(spawn_error)?;

        let pid = child.id();
        let pgid = pid
            .and_then(|pid| libc::pid_t::try_from(pid).ok())
            .ok_or_else(|| spawn_error(io::Error::other("pid not available")))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| spawn_error(io::Error::other("stdout not piped")))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| spawn_error(io::Error::other("stderr not piped")))?;

        let out_stream = ReaderStream::new(BufReader::new(stdout))
            .filter_map(|res| async move { res.ok().map(|b| b.to_vec()) });
        let err_stream = ReaderStream::new(BufReader::new(stderr))
            .filter_map(|res| async move { res.ok().map(|b| b.to_vec()) });

        let id = ProcId(self.next_id);
        self.next_id += 1;
        lock(&self.groups).insert(id, pgid);

        let groups = Arc::clone(&self.groups);
        let waiter = tokio::spawn(async move {
            let status = child.wait().await;
            lock(&groups).remove(&id);
            match status {
                Ok(status) => status.code(),
                Err(err) => {
                    tracing::warn!("Failed to wait for process {id:?}: {err}");
                    None
                }
            }
        });

        Ok(Spawned {
            id,
            pid,
            stdout: Box::pin(out_stream),
            stderr: Box::pin(err_stream),
            exit: Box::pin(async move { waiter.await.ok().flatten() }),
        })
    }

    async fn kill(&mut self, id: ProcId) -> Result<()> {
        let Some(pgid) = lock(&self.groups).get(&id).copied() else {
            tracing::debug!("Process {id:?} already exited");
            return Ok(());
        };

        #[allow(unsafe_code)]
        unsafe {
            let rc = killpg(pgid, SIGKILL);
            if rc == -1 {
                let source = io::Error::last_os_error();
                if source.raw_os_error() == Some(ESRCH) {
                    return Ok(());
                }
                return Err(Error::ProcessKill { id, source });
            }
        }

        Ok(())
    }
}
