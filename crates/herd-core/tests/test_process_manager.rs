#![cfg(unix)]

use std::time::Duration;

use futures::StreamExt;
use herd_core::{BoxStream, CommandSpec, Error, ProcessManager, UnixProcessManager};

fn fixture(name: &str) -> CommandSpec {
    CommandSpec {
        name: name.to_owned(),
        cmd: vec!["bash".to_owned(), format!("./{name}.sh")],
        cwd: Some("./tests/fixtures/".parse().unwrap()),
        env: vec![],
    }
}

async fn collect(mut stream: BoxStream<Vec<u8>>) -> String {
    let mut actual = String::new();
    while let Some(chunk) = stream.next().await {
        actual.push_str(&String::from_utf8_lossy(&chunk));
    }
    actual
}

#[tokio::test]
async fn test_process_manager_stdout() {
    let mut pm = UnixProcessManager::new();

    let out = pm.spawn(fixture("stdout")).await.unwrap();

    assert_eq!(
        collect(out.stdout).await,
        "INFO: line 1\nINFO: line 2\nINFO: stdout.sh finished\n"
    );
    assert_eq!(collect(out.stderr).await, "");
    assert_eq!(out.exit.await, Some(0));
}

#[tokio::test]
async fn test_process_manager_stderr() {
    let mut pm = UnixProcessManager::new();

    let out = pm.spawn(fixture("stderr")).await.unwrap();

    assert_eq!(collect(out.stdout).await, "");
    assert_eq!(
        collect(out.stderr).await,
        "ERROR: line 1\nERROR: line 2\nERROR: stderr.sh finished\n"
    );
    assert_eq!(out.exit.await, Some(3));
}

#[tokio::test]
async fn test_process_manager_both() {
    let mut pm = UnixProcessManager::new();

    let out = pm.spawn(fixture("both")).await.unwrap();

    let (stdout, stderr) = tokio::join!(collect(out.stdout), collect(out.stderr));
    assert_eq!(
        stdout,
        "STDOUT: message 2\nSTDOUT: message 4\nSTDOUT: message 6\nSTDOUT: message 8\nboth.sh done\n"
    );
    assert_eq!(
        stderr,
        "STDERR: message 1\nSTDERR: message 3\nSTDERR: message 5\nSTDERR: message 7\n"
    );
}

#[tokio::test]
async fn test_process_manager_sigkill() {
    let mut pm = UnixProcessManager::new();

    let out = pm.spawn(fixture("infinite")).await.unwrap();
    assert!(out.pid.is_some());

    pm.kill(out.id).await.unwrap();
    let code = tokio::time::timeout(Duration::from_secs(5), out.exit)
        .await
        .expect("killed process did not exit");
    assert_eq!(code, None);

    // Killing an exited process is a no-op.
    pm.kill(out.id).await.unwrap();
}

#[tokio::test]
async fn test_process_manager_spawn_error() {
    let mut pm = UnixProcessManager::new();

    let result = pm
        .spawn(CommandSpec {
            name: "missing".to_owned(),
            cmd: vec!["./definitely-not-a-binary".to_owned()],
            cwd: None,
            env: vec![],
        })
        .await;
    assert!(matches!(result, Err(Error::ProcessSpawn { .. })));

    let result = pm
        .spawn(CommandSpec {
            name: "empty".to_owned(),
            cmd: vec![],
            cwd: None,
            env: vec![],
        })
        .await;
    assert!(matches!(result, Err(Error::ProcessSpawn { .. })));
}

#[tokio::test]
async fn test_process_manager_env() {
    let mut pm = UnixProcessManager::new();

    let out = pm
        .spawn(CommandSpec {
            name: "env".to_owned(),
            cmd: vec![
                "bash".to_owned(),
                "-c".to_owned(),
                "echo \"$HERD_TEST\"".to_owned(),
            ],
            cwd: None,
            env: vec![("HERD_TEST".to_owned(), "value".to_owned())],
        })
        .await
        .unwrap();

    assert_eq!(collect(out.stdout).await, "value\n");
}
