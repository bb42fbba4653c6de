// src/watch/watcher.rs

//! First pipeline stage: keeps directory registrations in step with the tree
//! and turns raw notifications into [`ChangeEvent`]s.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::engine::{forward, require_next, Flow, Inlet, Stage, StageHandle};
use crate::errors::{RelaunchError, Result};
use crate::fs::FileSystem;
use crate::types::{ChangeEvent, ChangeKind, FileInfo, RawNotification};
use crate::watch::source::NotificationSource;

/// Directories currently registered with the notification source.
#[derive(Debug, Default, Clone)]
pub struct WatchSet {
    dirs: BTreeSet<PathBuf>,
}

impl WatchSet {
    pub fn contains(&self, dir: &Path) -> bool {
        self.dirs.contains(dir)
    }

    pub fn len(&self) -> usize {
        self.dirs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.dirs.iter().map(PathBuf::as_path)
    }

    /// Register `root` and every directory below it.
    ///
    /// Unreadable subtrees are logged and skipped; returns how many
    /// directories were newly registered.
    fn add_tree(
        &mut self,
        source: &mut dyn NotificationSource,
        fs: &dyn FileSystem,
        root: &Path,
    ) -> usize {
        let mut added = 0;
        let mut stack = vec![root.to_path_buf()];

        while let Some(dir) = stack.pop() {
            if self.dirs.contains(&dir) {
                continue;
            }
            if let Err(err) = source.register(&dir) {
                warn!(dir = ?dir, error = %err, "failed to watch directory; skipping subtree");
                continue;
            }
            self.dirs.insert(dir.clone());
            added += 1;

            match fs.read_dir(&dir) {
                Ok(entries) => {
                    for entry in entries {
                        if !fs.is_symlink(&entry) && fs.is_dir(&entry) {
                            stack.push(entry);
                        }
                    }
                }
                Err(err) => {
                    warn!(dir = ?dir, error = %err, "cannot read directory; skipping subtree");
                }
            }
        }

        added
    }

    /// Unregister `dir` and every watched directory below it.
    fn remove_tree(&mut self, source: &mut dyn NotificationSource, dir: &Path) -> usize {
        let doomed: Vec<PathBuf> = self
            .dirs
            .range(dir.to_path_buf()..)
            .take_while(|p| p.starts_with(dir))
            .cloned()
            .collect();

        for path in &doomed {
            self.dirs.remove(path);
            // The OS usually drops the watch itself once the directory is gone.
            if let Err(err) = source.unregister(path) {
                debug!(dir = ?path, error = %err, "unwatch failed");
            }
        }

        doomed.len()
    }
}

/// Watches one or more directory trees and feeds every change downstream.
pub struct DirectoryWatcher<S: NotificationSource> {
    source: S,
    notifications: mpsc::UnboundedReceiver<RawNotification>,
    fs: Arc<dyn FileSystem>,
    watch_set: WatchSet,
}

impl<S: NotificationSource> std::fmt::Debug for DirectoryWatcher<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryWatcher")
            .field("watched", &self.watch_set.len())
            .finish_non_exhaustive()
    }
}

impl<S: NotificationSource> DirectoryWatcher<S> {
    /// Register every directory under `roots` with `source`.
    ///
    /// A root that does not exist or is not a directory is a configuration
    /// error; unreadable directories below a root are skipped.
    pub fn new(
        roots: &[PathBuf],
        mut source: S,
        notifications: mpsc::UnboundedReceiver<RawNotification>,
        fs: Arc<dyn FileSystem>,
    ) -> Result<Self> {
        let mut watch_set = WatchSet::default();

        for root in roots {
            if !fs.is_dir(root) {
                return Err(RelaunchError::ConfigError(format!(
                    "watch root {:?} is not a directory",
                    root
                )));
            }
            let added = watch_set.add_tree(&mut source, fs.as_ref(), root);
            info!(root = ?root, directories = added, "watching directory tree");
        }

        Ok(Self {
            source,
            notifications,
            fs,
            watch_set,
        })
    }

    pub fn watch_set(&self) -> &WatchSet {
        &self.watch_set
    }

    /// Stat the path, update the watch set and build the event.
    fn observe(&mut self, raw: RawNotification) -> ChangeEvent {
        let observed_at = SystemTime::now();
        let info = match self.fs.stat(&raw.path) {
            Ok(info) => info,
            Err(err) => {
                debug!(path = ?raw.path, error = %err, "stat failed; treating path as gone");
                None
            }
        };

        self.track_directories(&raw, info.as_ref());

        ChangeEvent::new(raw.path, raw.kind, observed_at, info)
    }

    fn track_directories(&mut self, raw: &RawNotification, info: Option<&FileInfo>) {
        let is_dir = info.is_some_and(|i| i.is_dir);

        match raw.kind {
            ChangeKind::Create | ChangeKind::Rename
                if is_dir && !self.watch_set.contains(&raw.path) =>
            {
                let added =
                    self.watch_set
                        .add_tree(&mut self.source, self.fs.as_ref(), &raw.path);
                debug!(dir = ?raw.path, added, "new directory registered");
            }
            kind if kind.is_removal() && info.is_none() && self.watch_set.contains(&raw.path) => {
                let removed = self.watch_set.remove_tree(&mut self.source, &raw.path);
                debug!(dir = ?raw.path, removed, "directory gone; unregistered");
            }
            _ => {}
        }
    }
}

impl<S: NotificationSource> Stage for DirectoryWatcher<S> {
    fn name(&self) -> &'static str {
        "watcher"
    }

    fn inlet(&self) -> Option<Inlet> {
        None
    }

    fn connect(self: Box<Self>, next: Option<Inlet>) -> Result<StageHandle> {
        let next = require_next("watcher", next)?;
        let mut this = *self;

        Ok(StageHandle::spawn("watcher", move |mut cancel| async move {
            loop {
                tokio::select! {
                    biased;
                    _ = &mut cancel => break,
                    raw = this.notifications.recv() => {
                        let Some(raw) = raw else {
                            debug!("notification source closed");
                            break;
                        };
                        trace!(path = ?raw.path, kind = %raw.kind, "raw notification");
                        let event = this.observe(raw);
                        if let Flow::Stop = forward("watcher", &next, event, &mut cancel).await {
                            break;
                        }
                    }
                }
            }
            debug!(watched = this.watch_set.len(), "watcher loop finished");
        }))
    }
}
