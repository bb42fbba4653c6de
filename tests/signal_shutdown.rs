// tests/signal_shutdown.rs
#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;
use tokio::time::{sleep, timeout, Duration, Instant};

const CONFIG: &str = r#"
[build]
cmd = "true"

[run]
artifact = "app"
grace = "2s"
settle = "0ms"
"#;

/// Lay out a project whose artifact records its pid and then sleeps.
fn project(dir: &Path) {
    std::fs::write(dir.join("Relaunch.toml"), CONFIG).unwrap();

    let app = dir.join("app");
    std::fs::write(&app, "#!/bin/sh\necho $$ > app.pid\nexec sleep 4242\n").unwrap();
    std::fs::set_permissions(&app, std::fs::Permissions::from_mode(0o755)).unwrap();
}

async fn read_pid(path: &Path) -> u32 {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        if let Ok(text) = std::fs::read_to_string(path) {
            if let Ok(pid) = text.trim().parse() {
                return pid;
            }
        }
        assert!(Instant::now() < deadline, "artifact never started");
        sleep(Duration::from_millis(25)).await;
    }
}

async fn send(signal: &str, pid: u32) -> bool {
    Command::new("kill")
        .arg(signal)
        .arg(pid.to_string())
        .stderr(Stdio::null())
        .status()
        .await
        .unwrap()
        .success()
}

async fn stops_child_on(signal: &str) {
    let dir = tempfile::tempdir().unwrap();
    let dir_path = dir.path().canonicalize().unwrap();
    project(&dir_path);

    let mut supervisor = Command::new(env!("CARGO_BIN_EXE_relaunch"))
        .arg("--config")
        .arg(dir_path.join("Relaunch.toml"))
        .arg(&dir_path)
        .current_dir(&dir_path)
        .env("PWD", &dir_path)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .unwrap();
    let supervisor_pid = supervisor.id().unwrap();

    let child_pid = read_pid(&dir_path.join("app.pid")).await;
    assert!(send("-0", child_pid).await, "artifact should be running");

    assert!(send(signal, supervisor_pid).await);
    let status = timeout(Duration::from_secs(10), supervisor.wait())
        .await
        .unwrap()
        .unwrap();
    assert!(status.success(), "supervisor exit: {status:?}");

    assert!(!send("-0", child_pid).await, "artifact outlived the supervisor");
}

#[tokio::test]
async fn sigterm_stops_the_supervised_process() {
    stops_child_on("-TERM").await;
}

#[tokio::test]
async fn sigint_stops_the_supervised_process() {
    stops_child_on("-INT").await;
}
