// src/fs/mock.rs

use super::FileSystem;
use crate::types::FileInfo;
use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
pub enum MockEntry {
    File(u64),
    Dir(Vec<String>), // List of child names
    /// Present in its parent listing but unreadable (permission denied).
    Unreadable,
}

/// In-memory tree used by tests.
///
/// Clones share the same tree, so a test can keep one handle and mutate the
/// filesystem while a stage holds another.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    files: Arc<Mutex<HashMap<PathBuf, MockEntry>>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&self, path: impl AsRef<Path>, len: u64) {
        self.insert(path.as_ref(), MockEntry::File(len));
    }

    pub fn add_dir(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        let mut files = self.files.lock().unwrap();
        if !matches!(files.get(path), Some(MockEntry::Dir(_))) {
            files.insert(path.to_path_buf(), MockEntry::Dir(Vec::new()));
        }
        Self::link_parent(&mut files, path);
    }

    /// A directory that shows up in listings but fails to be read.
    pub fn add_unreadable_dir(&self, path: impl AsRef<Path>) {
        self.insert(path.as_ref(), MockEntry::Unreadable);
    }

    /// Remove `path` and everything below it.
    pub fn remove(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        let mut files = self.files.lock().unwrap();
        files.retain(|p, _| !p.starts_with(path));
        if let (Some(parent), Some(name)) = (path.parent(), path.file_name()) {
            if let Some(MockEntry::Dir(children)) = files.get_mut(parent) {
                let name = name.to_string_lossy();
                children.retain(|c| c.as_str() != name);
            }
        }
    }

    fn insert(&self, path: &Path, entry: MockEntry) {
        let mut files = self.files.lock().unwrap();
        files.insert(path.to_path_buf(), entry);
        Self::link_parent(&mut files, path);
    }

    // Ensure parent directories exist implicitly and list `path` as a child.
    fn link_parent(files: &mut HashMap<PathBuf, MockEntry>, path: &Path) {
        let (Some(parent), Some(name)) = (path.parent(), path.file_name()) else {
            return;
        };
        if parent.as_os_str().is_empty() {
            return;
        }
        if !files.contains_key(parent) {
            files.insert(parent.to_path_buf(), MockEntry::Dir(Vec::new()));
            Self::link_parent(files, parent);
        }
        if let Some(MockEntry::Dir(children)) = files.get_mut(parent) {
            let name = name.to_string_lossy().into_owned();
            if !children.contains(&name) {
                children.push(name);
            }
        }
    }
}

impl FileSystem for MockFileSystem {
    fn stat(&self, path: &Path) -> Result<Option<FileInfo>> {
        let files = self.files.lock().unwrap();
        Ok(match files.get(path) {
            Some(MockEntry::File(len)) => Some(FileInfo::file(*len)),
            Some(MockEntry::Dir(_)) | Some(MockEntry::Unreadable) => Some(FileInfo::dir()),
            None => None,
        })
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
        // In mock, we just return the path as is, assuming absolute paths are used in tests
        Ok(path.to_path_buf())
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let files = self.files.lock().unwrap();
        match files.get(path) {
            Some(MockEntry::Dir(children)) => {
                Ok(children.iter().map(|name| path.join(name)).collect())
            }
            Some(MockEntry::Unreadable) => Err(anyhow!("Permission denied: {:?}", path)),
            _ => Err(anyhow!("Not a directory or not found: {:?}", path)),
        }
    }
}
