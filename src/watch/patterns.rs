// src/watch/patterns.rs

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::config::WatchSettings;
use crate::watch::path_utils::{is_hidden, relative_to_roots};

/// Why the filter kept or dropped a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Hidden,
    Extension,
    Excluded,
}

impl Verdict {
    pub fn is_accept(self) -> bool {
        self == Verdict::Accept
    }
}

/// The rules that decide which changes are build-relevant.
///
/// Patterns in `exclude` are matched against the path relative to the watched
/// root it lives under (e.g. `"vendor/lib/x.go"`), or against the full path
/// when it is under none of them.
#[derive(Clone)]
pub struct FilterRules {
    extensions: Vec<String>,
    exclude: Option<GlobSet>,
    roots: Vec<PathBuf>,
}

impl fmt::Debug for FilterRules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterRules")
            .field("extensions", &self.extensions)
            .field("roots", &self.roots)
            .finish_non_exhaustive()
    }
}

impl FilterRules {
    pub fn new(
        extensions: impl IntoIterator<Item = impl Into<String>>,
        exclude: &[String],
        roots: Vec<PathBuf>,
    ) -> Result<Self> {
        let extensions = extensions
            .into_iter()
            .map(|e| e.into().trim_start_matches('.').to_string())
            .collect();

        let exclude = if exclude.is_empty() {
            None
        } else {
            Some(build_globset(exclude).context("building exclude globset")?)
        };

        Ok(Self {
            extensions,
            exclude,
            roots,
        })
    }

    pub fn from_settings(settings: &WatchSettings, roots: Vec<PathBuf>) -> Result<Self> {
        Self::new(settings.extensions.iter().cloned(), &settings.exclude, roots)
    }

    pub fn check(&self, path: &Path) -> Verdict {
        if is_hidden(path) {
            return Verdict::Hidden;
        }

        let ext_ok = path
            .extension()
            .map(|ext| {
                let ext = ext.to_string_lossy();
                self.extensions.iter().any(|e| *e == ext)
            })
            .unwrap_or(false);
        if !ext_ok {
            return Verdict::Extension;
        }

        if let Some(exclude) = &self.exclude {
            let candidate = relative_to_roots(&self.roots, path)
                .unwrap_or_else(|| path.to_string_lossy().replace('\\', "/"));
            if exclude.is_match(&candidate) {
                return Verdict::Excluded;
            }
        }

        Verdict::Accept
    }
}

/// Build a GlobSet from simple string patterns.
pub fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = Glob::new(pat)
            .with_context(|| format!("invalid glob pattern: {pat}"))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}
