//! Per-service stdout/stderr log files.
//!
//! Layout: `{logs_root}/{service_id}/stdout.log` and `.../stderr.log`.
//! Files are truncated at the start of every run and kept after the service
//! is deregistered.

use std::{
    io,
    path::{Path, PathBuf},
    sync::Arc,
};

use herd_types::ServiceId;
use tokio::{fs, io::AsyncWriteExt, sync::Mutex};

use crate::error::{Error, Result};

pub const STDOUT_LOG: &str = "stdout.log";
pub const STDERR_LOG: &str = "stderr.log";

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LogStream {
    Stdout,
    Stderr,
}

impl LogStream {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            LogStream::Stdout => "stdout",
            LogStream::Stderr => "stderr",
        }
    }

    #[must_use]
    pub fn file_name(self) -> &'static str {
        match self {
            LogStream::Stdout => STDOUT_LOG,
            LogStream::Stderr => STDERR_LOG,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogStore {
    root: PathBuf,
}

impl LogStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn dir(&self, id: ServiceId) -> PathBuf {
        self.root.join(id.0.to_string())
    }

    #[must_use]
    pub fn path(&self, id: ServiceId, stream: LogStream) -> PathBuf {
        self.dir(id).join(stream.file_name())
    }

    /// Create the log directory of a service. An existing directory is fine.
    ///
    /// # Errors
    /// Returns `Error::Filesystem` for any failure other than "already exists".
    pub async fn ensure_dir(&self, id: ServiceId) -> Result<()> {
        fs::create_dir_all(&self.root)
            .await
            .map_err(Error::filesystem(&self.root))?;

        let dir = self.dir(id);
        match fs::create_dir(&dir).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => Ok(()),
            Err(err) => Err(Error::filesystem(dir)(err)),
        }
    }

    #[must_use]
    pub fn sink(&self, id: ServiceId) -> LogSink {
        LogSink {
            stdout: self.path(id, LogStream::Stdout),
            stderr: self.path(id, LogStream::Stderr),
            run: Arc::new(Mutex::new(0)),
        }
    }

    /// Read both log files of a service concurrently.
    ///
    /// # Errors
    /// Returns `Error::Filesystem` if either file cannot be read.
    pub async fn read(&self, id: ServiceId) -> Result<(String, String)> {
        let stdout = self.path(id, LogStream::Stdout);
        let stderr = self.path(id, LogStream::Stderr);

        let (out, err) = tokio::try_join!(
            async { fs::read(&stdout).await.map_err(Error::filesystem(&stdout)) },
            async { fs::read(&stderr).await.map_err(Error::filesystem(&stderr)) },
        )?;

        Ok((
            String::from_utf8_lossy(&out).into_owned(),
            String::from_utf8_lossy(&err).into_owned(),
        ))
    }
}

/// Write side of one service's logs.
///
/// Appends are tagged with the run they belong to; once a newer run has
/// reset the files, appends from older runs are dropped.
#[derive(Debug, Clone)]
pub struct LogSink {
    stdout: PathBuf,
    stderr: PathBuf,
    run: Arc<Mutex<u64>>,
}

impl LogSink {
    fn path(&self, stream: LogStream) -> &Path {
        match stream {
            LogStream::Stdout => &self.stdout,
            LogStream::Stderr => &self.stderr,
        }
    }

    /// Start a new run: truncate (or create) both files and return the run number.
    ///
    /// # Errors
    /// Returns `Error::Filesystem` if a file cannot be truncated.
    pub async fn reset(&self) -> Result<u64> {
        let mut run = self.run.lock().await;
        *run += 1;
        for path in [&self.stdout, &self.stderr] {
            fs::write(path, b"").await.map_err(Error::filesystem(path))?;
        }
        Ok(*run)
    }

    /// Append a chunk produced by run `run`. Returns `false` when the chunk
    /// was dropped because a newer run owns the files.
    ///
    /// # Errors
    /// Returns `Error::Filesystem` if the file cannot be opened or written.
    pub async fn append(&self, run: u64, stream: LogStream, chunk: &[u8]) -> Result<bool> {
        let current = self.run.lock().await;
        if *current != run {
            return Ok(false);
        }

        let path = self.path(stream);
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(Error::filesystem(path))?;
        file.write_all(chunk).await.map_err(Error::filesystem(path))?;
        file.flush().await.map_err(Error::filesystem(path))?;
        drop(current);

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ensure_dir_is_idempotent() {
        let temp = tempfile::tempdir().unwrap();
        let store = LogStore::new(temp.path().join("logs"));

        store.ensure_dir(ServiceId(0)).await.unwrap();
        store.ensure_dir(ServiceId(0)).await.unwrap();

        assert!(store.dir(ServiceId(0)).is_dir());
    }

    #[tokio::test]
    async fn test_ensure_dir_propagates_other_errors() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path().join("not-a-dir");
        std::fs::write(&root, "file in the way").unwrap();
        let store = LogStore::new(&root);

        let result = store.ensure_dir(ServiceId(1)).await;
        assert!(matches!(result, Err(Error::Filesystem { .. })));
    }

    #[tokio::test]
    async fn test_append_and_read() {
        let temp = tempfile::tempdir().unwrap();
        let store = LogStore::new(temp.path());
        let id = ServiceId(2);
        store.ensure_dir(id).await.unwrap();

        let sink = store.sink(id);
        let run = sink.reset().await.unwrap();
        assert!(sink.append(run, LogStream::Stdout, b"hello ").await.unwrap());
        assert!(sink.append(run, LogStream::Stderr, b"oops\n").await.unwrap());
        assert!(sink.append(run, LogStream::Stdout, b"world\n").await.unwrap());

        let (stdout, stderr) = store.read(id).await.unwrap();
        assert_eq!(stdout, "hello world\n");
        assert_eq!(stderr, "oops\n");
    }

    #[tokio::test]
    async fn test_reset_truncates_and_drops_stale_appends() {
        let temp = tempfile::tempdir().unwrap();
        let store = LogStore::new(temp.path());
        let id = ServiceId(3);
        store.ensure_dir(id).await.unwrap();

        let sink = store.sink(id);
        let first = sink.reset().await.unwrap();
        sink.append(first, LogStream::Stdout, b"first run\n")
            .await
            .unwrap();

        let second = sink.reset().await.unwrap();
        assert!(second > first);
        assert!(!sink
            .append(first, LogStream::Stdout, b"late output\n")
            .await
            .unwrap());
        sink.append(second, LogStream::Stdout, b"second run\n")
            .await
            .unwrap();

        let (stdout, stderr) = store.read(id).await.unwrap();
        assert_eq!(stdout, "second run\n");
        assert_eq!(stderr, "");
    }

    #[tokio::test]
    async fn test_read_missing_logs_fails() {
        let temp = tempfile::tempdir().unwrap();
        let store = LogStore::new(temp.path());

        let result = store.read(ServiceId(4)).await;
        assert!(matches!(result, Err(Error::Filesystem { .. })));
    }
}
