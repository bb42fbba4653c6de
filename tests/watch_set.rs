// tests/watch_set.rs

mod common;
use crate::common::fakes::{ScriptedSource, SourceCall};
use crate::common::{init_tracing, downstream, with_timeout};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::time::Duration;

use relaunch::engine::Stage;
use relaunch::fs::mock::MockFileSystem;
use relaunch::fs::RealFileSystem;
use relaunch::types::{ChangeKind, RawNotification};
use relaunch::watch::{DirectoryWatcher, NotifySource};

fn project() -> MockFileSystem {
    let fs = MockFileSystem::new();
    fs.add_file("/proj/main.go", 10);
    fs.add_file("/proj/internal/db/db.go", 10);
    fs
}

#[tokio::test]
async fn created_and_removed_directories_follow_the_tree() {
    init_tracing();

    let fs = project();
    let (source, inject, notifications) = ScriptedSource::channel();
    let watcher = DirectoryWatcher::new(
        &[PathBuf::from("/proj")],
        source.clone(),
        notifications,
        Arc::new(fs.clone()),
    )
    .unwrap();
    let (next, mut out) = downstream(16);
    let mut handle = Box::new(watcher).connect(Some(next)).unwrap();

    assert_eq!(
        source.registered(),
        vec![
            PathBuf::from("/proj"),
            PathBuf::from("/proj/internal"),
            PathBuf::from("/proj/internal/db"),
        ]
    );

    // A new tree appears in one go (e.g. `git checkout`).
    fs.add_file("/proj/api/v1/routes.go", 10);
    inject
        .send(RawNotification::new("/proj/api", ChangeKind::Create))
        .unwrap();
    let event = with_timeout(out.recv()).await.unwrap();
    assert_eq!(event.path(), Path::new("/proj/api"));
    assert!(event.info().unwrap().is_dir);
    assert!(source.is_registered("/proj/api"));
    assert!(source.is_registered("/proj/api/v1"));

    // And goes away again.
    fs.remove("/proj/api");
    inject
        .send(RawNotification::new("/proj/api", ChangeKind::Remove))
        .unwrap();
    let event = with_timeout(out.recv()).await.unwrap();
    assert!(event.info().is_none());
    assert!(!source.is_registered("/proj/api"));
    assert!(!source.is_registered("/proj/api/v1"));

    // Stragglers for the removed tree are forwarded but never re-register it.
    inject
        .send(RawNotification::new("/proj/api/v1/routes.go", ChangeKind::Remove))
        .unwrap();
    with_timeout(out.recv()).await.unwrap();

    let calls = source.calls();
    let unregistered_at = calls
        .iter()
        .position(|c| *c == SourceCall::Unregister(PathBuf::from("/proj/api")))
        .unwrap();
    assert!(
        !calls[unregistered_at..]
            .iter()
            .any(|c| matches!(c, SourceCall::Register(p) if p.starts_with("/proj/api")))
    );

    handle.close().await.unwrap();
}

#[tokio::test]
async fn events_keep_observation_order_and_metadata() {
    let fs = project();
    let (source, inject, notifications) = ScriptedSource::channel();
    let watcher = DirectoryWatcher::new(
        &[PathBuf::from("/proj")],
        source,
        notifications,
        Arc::new(fs.clone()),
    )
    .unwrap();
    let (next, mut out) = downstream(16);
    let mut handle = Box::new(watcher).connect(Some(next)).unwrap();

    inject
        .send(RawNotification::new("/proj/main.go", ChangeKind::Write))
        .unwrap();
    inject
        .send(RawNotification::new("/proj/gone.go", ChangeKind::Remove))
        .unwrap();
    inject
        .send(RawNotification::new("/proj/internal/db/db.go", ChangeKind::Chmod))
        .unwrap();

    let first = with_timeout(out.recv()).await.unwrap();
    assert_eq!(first.path(), Path::new("/proj/main.go"));
    assert_eq!(first.kind(), ChangeKind::Write);
    assert_eq!(first.info().unwrap().len, 10);

    let second = with_timeout(out.recv()).await.unwrap();
    assert_eq!(second.path(), Path::new("/proj/gone.go"));
    assert!(second.info().is_none());

    let third = with_timeout(out.recv()).await.unwrap();
    assert_eq!(third.kind(), ChangeKind::Chmod);

    handle.close().await.unwrap();
}

#[tokio::test]
async fn refused_directory_is_skipped_not_fatal() {
    let fs = project();
    fs.add_file("/proj/secret/keys.go", 10);
    let (source, _inject, notifications) = ScriptedSource::channel();
    source.refuse("/proj/secret");

    let watcher = DirectoryWatcher::new(
        &[PathBuf::from("/proj")],
        source.clone(),
        notifications,
        Arc::new(fs),
    )
    .unwrap();

    assert!(!watcher.watch_set().contains(Path::new("/proj/secret")));
    assert!(watcher.watch_set().contains(Path::new("/proj/internal/db")));
    assert_eq!(source.registered().len(), 3);
}

#[tokio::test]
async fn several_roots_are_all_watched() {
    let fs = project();
    fs.add_file("/lib/util/strings.go", 10);
    let (source, _inject, notifications) = ScriptedSource::channel();

    let watcher = DirectoryWatcher::new(
        &[PathBuf::from("/proj"), PathBuf::from("/lib")],
        source.clone(),
        notifications,
        Arc::new(fs),
    )
    .unwrap();

    assert_eq!(watcher.watch_set().len(), 5);
    assert!(source.is_registered("/lib/util"));
}

/// Same flow against the real platform watcher.
#[tokio::test]
async fn real_watcher_follows_new_directories() {
    let tmp = tempfile::tempdir().unwrap();
    let root = std::fs::canonicalize(tmp.path()).unwrap();

    let (source, notifications) = NotifySource::new().unwrap();
    let watcher = DirectoryWatcher::new(
        &[root.clone()],
        source,
        notifications,
        Arc::new(RealFileSystem),
    )
    .unwrap();
    let (next, mut out) = downstream(64);
    let mut handle = Box::new(watcher).connect(Some(next)).unwrap();

    let sub = root.join("pkg");
    std::fs::create_dir(&sub).unwrap();

    // Registration happens before the directory's event is forwarded.
    with_timeout(async {
        loop {
            let event = out.recv().await.unwrap();
            if event.path() == sub {
                break;
            }
        }
    })
    .await;

    let file = sub.join("pkg.go");
    std::fs::write(&file, b"package pkg\n").unwrap();

    with_timeout(async {
        loop {
            let event = out.recv().await.unwrap();
            if event.path() == file {
                break;
            }
        }
    })
    .await;

    tokio::time::timeout(Duration::from_secs(5), handle.close())
        .await
        .unwrap()
        .unwrap();
}
