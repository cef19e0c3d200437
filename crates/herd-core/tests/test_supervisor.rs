//! Drives the supervisor against real processes.
//!
//! The interpreter is `env` and the debug flag `DEBUG_PORT`, so a service is
//! started as `env DEBUG_PORT=<port> <entry point>` and sees its port in the
//! environment.
#![cfg(unix)]

use std::{os::unix::fs::PermissionsExt, path::Path, time::Duration};

use herd_config::Config;
use herd_core::{Supervisor, UnixProcessManager};
use herd_types::{ServiceId, ServiceLogs, ServiceStatus};
use tempfile::TempDir;

fn write_script(root: &Path, name: &str, body: &str) {
    let path = root.join(name);
    std::fs::write(&path, format!("#!/usr/bin/env bash\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

fn setup() -> (TempDir, Supervisor) {
    let temp = tempfile::tempdir().unwrap();
    let services = temp.path().join("services");
    std::fs::create_dir(&services).unwrap();

    write_script(
        &services,
        "hello.sh",
        "echo \"port=$DEBUG_PORT\"\necho \"warning\" >&2\nexit 2",
    );
    write_script(&services, "forever.sh", "echo up\nexec sleep 600");

    let config = Config {
        services_root: services,
        logs_root: temp.path().join("logs"),
        debug_port_base: 7100,
        interpreter: "env".to_owned(),
        debug_flag: "DEBUG_PORT".to_owned(),
        ..Config::default()
    };

    let supervisor = Supervisor::new(UnixProcessManager::new(), &config);
    (temp, supervisor)
}

async fn wait_for(
    supervisor: &Supervisor,
    id: ServiceId,
    predicate: impl Fn(&ServiceLogs) -> bool,
) -> ServiceLogs {
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let current = supervisor.get_with_logs(id).await.unwrap();
            if predicate(&current) {
                return current;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("condition not reached in time")
}

#[tokio::test]
async fn test_service_output_is_captured() {
    let (temp, supervisor) = setup();
    let id = supervisor.register("hello.sh").await.unwrap();

    supervisor.spawn(id).await.unwrap();

    let done = wait_for(&supervisor, id, |s| {
        s.service.status == ServiceStatus::Stopped && s.stdout.contains("port=")
    })
    .await;
    assert_eq!(done.stdout, "port=7100\n");
    assert_eq!(done.stderr, "warning\n");
    assert!(done.service.kill.is_some());
    assert!(done.service.start <= done.service.kill);

    let on_disk = std::fs::read_to_string(temp.path().join("logs/0/stdout.log")).unwrap();
    assert_eq!(on_disk, "port=7100\n");
}

#[tokio::test]
async fn test_kill_and_remove_running_service() {
    let (temp, supervisor) = setup();
    let id = supervisor.register("./forever.sh").await.unwrap();

    supervisor.spawn(id).await.unwrap();
    wait_for(&supervisor, id, |s| s.stdout == "up\n").await;

    supervisor.kill(id).await.unwrap();
    let view = supervisor.get(id).await.unwrap();
    assert_eq!(view.status, ServiceStatus::Stopped);
    let killed_at = view.kill;

    supervisor.spawn(id).await.unwrap();
    assert_eq!(supervisor.get(id).await.unwrap().debug_port, Some(7101));
    wait_for(&supervisor, id, |s| s.stdout == "up\n").await;

    // The first run's exit notification must not stop the second run.
    tokio::time::sleep(Duration::from_millis(200)).await;
    let view = supervisor.get(id).await.unwrap();
    assert_eq!(view.status, ServiceStatus::Running);
    assert!(view.kill == killed_at);

    supervisor.remove(id).await.unwrap();
    assert!(!supervisor.exists(id).await.unwrap());
    assert!(temp.path().join("logs/0/stdout.log").exists());
}
