// src/config/model.rs

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::engine::debounce::DEFAULT_QUIET_PERIOD;

/// Configuration as read from a TOML file, before validation.
///
/// ```toml
/// [watch]
/// extensions = ["go"]
/// exclude = ["vendor/**"]
/// quiet_period = "1s"
///
/// [build]
/// cmd = "go build"
///
/// [run]
/// args = ["--port", "8080"]
/// settle = "200ms"
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub watch: RawWatchSection,

    #[serde(default)]
    pub build: RawBuildSection,

    #[serde(default)]
    pub run: RawRunSection,
}

/// `[watch]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RawWatchSection {
    /// Extensions that make a change build-relevant, with or without the
    /// leading dot.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Glob patterns (relative to the watched root) whose changes are ignored.
    #[serde(default)]
    pub exclude: Vec<String>,

    #[serde(default = "default_one_second")]
    pub quiet_period: String,

    /// How often the filter and build stages check for settled events.
    #[serde(default = "default_one_second")]
    pub tick: String,

    /// Capacity of each stage's inbound queue.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for RawWatchSection {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            exclude: Vec::new(),
            quiet_period: default_one_second(),
            tick: default_one_second(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

/// `[build]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RawBuildSection {
    /// Shell command that builds the project.
    #[serde(default = "default_build_cmd")]
    pub cmd: String,

    /// Quiet period between a successful build and the restart it triggers.
    #[serde(default = "default_one_second")]
    pub quiet_period: String,
}

impl Default for RawBuildSection {
    fn default() -> Self {
        Self {
            cmd: default_build_cmd(),
            quiet_period: default_one_second(),
        }
    }
}

/// `[run]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RawRunSection {
    /// Path to the built executable. Relative paths are resolved against the
    /// working directory; when unset the executable is
    /// `<workdir>/<workdir name>`.
    #[serde(default)]
    pub artifact: Option<PathBuf>,

    #[serde(default)]
    pub args: Vec<String>,

    /// How long to wait for a killed process to be reaped.
    #[serde(default = "default_grace")]
    pub grace: String,

    /// Pause between a process exiting and its replacement starting.
    #[serde(default = "default_settle")]
    pub settle: String,

    /// Launch an already-built artifact as soon as the supervisor starts.
    #[serde(default = "default_true")]
    pub run_on_start: bool,
}

impl Default for RawRunSection {
    fn default() -> Self {
        Self {
            artifact: None,
            args: Vec::new(),
            grace: default_grace(),
            settle: default_settle(),
            run_on_start: default_true(),
        }
    }
}

fn default_extensions() -> Vec<String> {
    vec!["go".to_string()]
}

fn default_one_second() -> String {
    "1s".to_string()
}

fn default_queue_capacity() -> usize {
    crate::engine::DEFAULT_QUEUE_CAPACITY
}

fn default_build_cmd() -> String {
    "go build".to_string()
}

fn default_grace() -> String {
    "2s".to_string()
}

fn default_settle() -> String {
    "200ms".to_string()
}

fn default_true() -> bool {
    true
}

/// Validated configuration.
///
/// Built through `TryFrom<RawConfigFile>` (see `validate`), so every duration
/// is parsed and every glob compiles.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub watch: WatchSettings,
    pub build: BuildSettings,
    pub run: RunSettings,
}

#[derive(Debug, Clone)]
pub struct WatchSettings {
    /// Normalised: no leading dot.
    pub extensions: Vec<String>,
    pub exclude: Vec<String>,
    pub quiet_period: Duration,
    pub tick: Duration,
    pub queue_capacity: usize,
}

#[derive(Debug, Clone)]
pub struct BuildSettings {
    pub cmd: String,
    pub quiet_period: Duration,
}

#[derive(Debug, Clone)]
pub struct RunSettings {
    pub artifact: Option<PathBuf>,
    pub args: Vec<String>,
    pub grace: Duration,
    pub settle: Duration,
    pub run_on_start: bool,
}

impl RunSettings {
    /// Where the built executable is expected.
    ///
    /// Defaults to `<workdir>/<basename(workdir)>`, matching where `go build`
    /// leaves its output.
    pub fn artifact_path(&self, workdir: &Path) -> PathBuf {
        match &self.artifact {
            Some(path) => workdir.join(path),
            None => {
                let name = workdir
                    .file_name()
                    .map(|n| n.to_os_string())
                    .unwrap_or_default();
                workdir.join(name)
            }
        }
    }
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        watch: WatchSettings,
        build: BuildSettings,
        run: RunSettings,
    ) -> Self {
        Self { watch, build, run }
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            watch: WatchSettings {
                extensions: default_extensions(),
                exclude: Vec::new(),
                quiet_period: DEFAULT_QUIET_PERIOD,
                tick: DEFAULT_QUIET_PERIOD,
                queue_capacity: default_queue_capacity(),
            },
            build: BuildSettings {
                cmd: default_build_cmd(),
                quiet_period: DEFAULT_QUIET_PERIOD,
            },
            run: RunSettings {
                artifact: None,
                args: Vec::new(),
                grace: Duration::from_secs(2),
                settle: Duration::from_millis(200),
                run_on_start: true,
            },
        }
    }
}
