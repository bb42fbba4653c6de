// tests/real_process.rs
#![cfg(unix)]

use std::path::Path;

use tokio::time::{timeout, Duration, Instant};

use relaunch::errors::RelaunchError;
use relaunch::exec::{
    BuildBackend, ExitOutcome, ProcessBackend, ShellBuild, SupervisedProcess, TokioProcessBackend,
};

fn sh(script: &str) -> Vec<String> {
    vec!["-c".to_string(), script.to_string()]
}

#[tokio::test]
async fn shell_build_reports_exit_status() {
    let dir = tempfile::tempdir().unwrap();

    let mut ok = ShellBuild::new("touch built", dir.path());
    assert_eq!(ok.build().await.unwrap(), ExitOutcome::Success);
    assert!(dir.path().join("built").is_file(), "build runs in the working directory");

    let mut failing = ShellBuild::new("exit 3", dir.path());
    assert_eq!(failing.build().await.unwrap(), ExitOutcome::Failed(3));
}

#[tokio::test]
async fn missing_build_tool_is_a_spawn_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut build = ShellBuild::new("relaunch-no-such-compiler --all", dir.path());

    match build.build().await {
        Err(RelaunchError::BuildSpawn { cmd, .. }) => {
            assert_eq!(cmd, "relaunch-no-such-compiler --all");
        }
        other => panic!("expected BuildSpawn, got {other:?}"),
    }
}

#[tokio::test]
async fn terminate_kills_and_reaps() {
    let mut backend = TokioProcessBackend;
    let mut child = backend.spawn(Path::new("/bin/sh"), &sh("sleep 30")).unwrap();
    assert!(child.id().is_some());

    timeout(Duration::from_secs(5), child.terminate(Duration::from_secs(2)))
        .await
        .unwrap()
        .unwrap();

    // Already dead: still fine.
    child.terminate(Duration::from_secs(2)).await.unwrap();
}

#[tokio::test]
async fn terminate_force_kills_after_grace() {
    let mut backend = TokioProcessBackend;
    let mut child = backend
        .spawn(Path::new("/bin/sh"), &sh("trap '' TERM; while :; do sleep 0.05; done"))
        .unwrap();
    // Let the shell install its trap first.
    tokio::time::sleep(Duration::from_millis(200)).await;

    let grace = Duration::from_millis(300);
    let started = Instant::now();
    timeout(Duration::from_secs(5), child.terminate(grace))
        .await
        .unwrap()
        .unwrap();
    assert!(started.elapsed() >= grace, "stop request should have been ignored");

    let outcome = timeout(Duration::from_secs(1), child.wait()).await;
    assert!(!matches!(outcome, Ok(Ok(ExitOutcome::Success))));
}

#[tokio::test]
async fn wait_reports_natural_exit() {
    let mut backend = TokioProcessBackend;
    let mut child = backend.spawn(Path::new("/bin/sh"), &sh("exit 4")).unwrap();

    let outcome = timeout(Duration::from_secs(5), child.wait())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(outcome, ExitOutcome::Failed(4));
    child.terminate(Duration::from_secs(1)).await.unwrap();
}

#[tokio::test]
async fn spawning_a_missing_artifact_fails() {
    let dir = tempfile::tempdir().unwrap();
    let mut backend = TokioProcessBackend;
    assert!(backend.spawn(&dir.path().join("app"), &[]).is_err());
}
