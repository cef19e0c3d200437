use std::{
    io,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use futures::FutureExt;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;

use crate::{
    error::{Error, Result},
    process_manager::{CommandSpec, ProcId, ProcessManager, Spawned},
};

#[derive(Default)]
struct MockChild {
    stdout: Option<mpsc::Sender<Vec<u8>>>,
    stderr: Option<mpsc::Sender<Vec<u8>>>,
    exit: Option<oneshot::Sender<Option<i32>>>,
}

#[derive(Default)]
struct MockState {
    specs: Vec<CommandSpec>,
    children: Vec<MockChild>,
    killed: Vec<ProcId>,
    fail_next_spawn: bool,
}

/// In-memory process manager whose children are driven by the test.
///
/// Clones share state, so a test keeps one clone and hands the other to the
/// code under test.
#[derive(Clone, Default)]
pub struct MockProcessManager {
    state: Arc<Mutex<MockState>>,
}

impl MockProcessManager {
    pub fn specs(&self) -> Vec<CommandSpec> {
        self.state.lock().unwrap().specs.clone()
    }

    pub fn killed(&self) -> Vec<ProcId> {
        self.state.lock().unwrap().killed.clone()
    }

    pub fn fail_next_spawn(&self) {
        self.state.lock().unwrap().fail_next_spawn = true;
    }

    pub async fn stdout(&self, id: ProcId, chunk: &str) {
        let sender = self.state.lock().unwrap().children[child_index(id)]
            .stdout
            .clone();
        if let Some(sender) = sender {
            sender.send(chunk.as_bytes().to_vec()).await.unwrap();
        }
    }

    pub async fn stderr(&self, id: ProcId, chunk: &str) {
        let sender = self.state.lock().unwrap().children[child_index(id)]
            .stderr
            .clone();
        if let Some(sender) = sender {
            sender.send(chunk.as_bytes().to_vec()).await.unwrap();
        }
    }

    /// Close the child's output streams and fire its exit notification.
    pub fn exit(&self, id: ProcId, code: Option<i32>) {
        let mut state = self.state.lock().unwrap();
        let child = &mut state.children[child_index(id)];
        child.stdout = None;
        child.stderr = None;
        if let Some(exit) = child.exit.take() {
            let _ = exit.send(code);
        }
    }
}

fn child_index(id: ProcId) -> usize {
    usize::try_from(id.0).unwrap()
}

#[async_trait]
impl ProcessManager for MockProcessManager {
    async fn spawn(&mut self, spec: CommandSpec) -> Result<Spawned> {
        let mut state = self.state.lock().unwrap();
        if std::mem::take(&mut state.fail_next_spawn) {
            return Err(Error::ProcessSpawn {
                command: spec.cmd.join(" "),
                source: io::Error::new(io::ErrorKind::NotFound, "mock spawn failure"),
            });
        }

        let (stdout_tx, stdout) = mpsc::channel(16);
        let (stderr_tx, stderr) = mpsc::channel(16);
        let (exit_tx, exit) = oneshot::channel();

        let id = ProcId(state.children.len() as u64);
        state.specs.push(spec);
        state.children.push(MockChild {
            stdout: Some(stdout_tx),
            stderr: Some(stderr_tx),
            exit: Some(exit_tx),
        });

        Ok(Spawned {
            id,
            pid: None,
            stdout: Box::pin(ReceiverStream::new(stdout)),
            stderr: Box::pin(ReceiverStream::new(stderr)),
            exit: exit.map(|code| code.unwrap_or(None)).boxed(),
        })
    }

    async fn kill(&mut self, id: ProcId) -> Result<()> {
        self.state.lock().unwrap().killed.push(id);
        self.exit(id, None);
        Ok(())
    }
}
