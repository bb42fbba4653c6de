// src/types.rs

//! Data flowing through the pipeline.

use std::fmt;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use notify::EventKind;
use notify::event::ModifyKind;

/// What happened to a path, as reported by the notification source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Create,
    Write,
    Remove,
    Rename,
    Chmod,
}

impl ChangeKind {
    /// Map a `notify` event kind onto the pipeline vocabulary.
    ///
    /// Returns `None` for access notifications and other kinds that do not
    /// describe a change to the tree.
    pub fn from_notify(kind: &EventKind) -> Option<Self> {
        match kind {
            EventKind::Create(_) => Some(ChangeKind::Create),
            EventKind::Modify(ModifyKind::Name(_)) => Some(ChangeKind::Rename),
            EventKind::Modify(ModifyKind::Metadata(_)) => Some(ChangeKind::Chmod),
            EventKind::Modify(_) => Some(ChangeKind::Write),
            EventKind::Remove(_) => Some(ChangeKind::Remove),
            EventKind::Access(_) | EventKind::Any | EventKind::Other => None,
        }
    }

    /// True for kinds after which the path may no longer exist under its name.
    pub fn is_removal(self) -> bool {
        matches!(self, ChangeKind::Remove | ChangeKind::Rename)
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChangeKind::Create => "CREATE",
            ChangeKind::Write => "WRITE",
            ChangeKind::Remove => "REMOVE",
            ChangeKind::Rename => "RENAME",
            ChangeKind::Chmod => "CHMOD",
        };
        f.write_str(s)
    }
}

/// Filesystem metadata snapshot taken when an event was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileInfo {
    pub is_dir: bool,
    pub len: u64,
    /// Unix permission bits (approximated from the read-only flag elsewhere).
    pub mode: u32,
}

impl FileInfo {
    pub fn dir() -> Self {
        Self {
            is_dir: true,
            len: 0,
            mode: 0o755,
        }
    }

    pub fn file(len: u64) -> Self {
        Self {
            is_dir: false,
            len,
            mode: 0o644,
        }
    }
}

impl From<&Metadata> for FileInfo {
    fn from(meta: &Metadata) -> Self {
        #[cfg(unix)]
        let mode = {
            use std::os::unix::fs::PermissionsExt;
            meta.permissions().mode()
        };
        #[cfg(not(unix))]
        let mode = if meta.permissions().readonly() { 0o444 } else { 0o644 };

        Self {
            is_dir: meta.is_dir(),
            len: meta.len(),
            mode,
        }
    }
}

/// A raw notification as delivered by a [`NotificationSource`].
///
/// [`NotificationSource`]: crate::watch::NotificationSource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawNotification {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

impl RawNotification {
    pub fn new(path: impl Into<PathBuf>, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// The unit handed from stage to stage.
///
/// Built once by the directory watcher and never mutated afterwards; stages
/// move it along or drop it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    path: PathBuf,
    kind: ChangeKind,
    observed_at: SystemTime,
    info: Option<FileInfo>,
}

impl ChangeEvent {
    pub fn new(
        path: impl Into<PathBuf>,
        kind: ChangeKind,
        observed_at: SystemTime,
        info: Option<FileInfo>,
    ) -> Self {
        Self {
            path: path.into(),
            kind,
            observed_at,
            info,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> ChangeKind {
        self.kind
    }

    pub fn observed_at(&self) -> SystemTime {
        self.observed_at
    }

    /// `None` when the path had already vanished at observation time.
    pub fn info(&self) -> Option<&FileInfo> {
        self.info.as_ref()
    }
}

impl fmt::Display for ChangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:?}", self.kind, self.path)
    }
}
