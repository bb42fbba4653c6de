// src/watch/source.rs

//! The filesystem notification source the directory watcher drives.

use std::path::Path;

use anyhow::{Context, Result};
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::types::{ChangeKind, RawNotification};

/// Commands the directory watcher issues to the notification backend.
///
/// Notifications themselves arrive on a separate channel handed to the
/// watcher alongside the source. Only directories are ever registered.
pub trait NotificationSource: Send + 'static {
    fn register(&mut self, dir: &Path) -> Result<()>;
    fn unregister(&mut self, dir: &Path) -> Result<()>;
}

/// Production source backed by `notify`'s platform watcher.
///
/// Every directory is watched non-recursively; the directory watcher keeps the
/// set of registrations in step with the tree.
pub struct NotifySource {
    inner: RecommendedWatcher,
}

impl std::fmt::Debug for NotifySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifySource").finish()
    }
}

impl NotifySource {
    /// Create the platform watcher and the stream its notifications arrive on.
    pub fn new() -> crate::errors::Result<(Self, mpsc::UnboundedReceiver<RawNotification>)> {
        // Channel from the blocking notify callback into the async world.
        let (tx, rx) = mpsc::unbounded_channel::<RawNotification>();

        // Closure called synchronously by notify whenever an event arrives.
        let inner = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let Some(kind) = ChangeKind::from_notify(&event.kind) else {
                        return;
                    };
                    for path in event.paths {
                        if tx.send(RawNotification { path, kind }).is_err() {
                            // Receiver gone: the watcher is shutting down.
                            return;
                        }
                    }
                }
                Err(err) => {
                    // We can't log via tracing here easily, so fallback to stderr.
                    eprintln!("relaunch: file watch error: {err}");
                }
            },
            Config::default(),
        )?;

        Ok((Self { inner }, rx))
    }
}

impl NotificationSource for NotifySource {
    fn register(&mut self, dir: &Path) -> Result<()> {
        self.inner
            .watch(dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("watching {:?}", dir))
    }

    fn unregister(&mut self, dir: &Path) -> Result<()> {
        self.inner
            .unwatch(dir)
            .with_context(|| format!("unwatching {:?}", dir))
    }
}
