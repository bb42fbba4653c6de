#![allow(dead_code)]

use std::path::PathBuf;

use relaunch::config::{ConfigFile, RawConfigFile};

/// Builder for `ConfigFile` to simplify test setup.
///
/// Durations are given as config strings ("1s", "250ms") and go through the
/// same validation as a file on disk.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn extensions(mut self, exts: &[&str]) -> Self {
        self.config.watch.extensions = exts.iter().map(|e| e.to_string()).collect();
        self
    }

    pub fn exclude(mut self, pattern: &str) -> Self {
        self.config.watch.exclude.push(pattern.to_string());
        self
    }

    pub fn quiet_period(mut self, quiet: &str) -> Self {
        self.config.watch.quiet_period = quiet.to_string();
        self
    }

    pub fn tick(mut self, tick: &str) -> Self {
        self.config.watch.tick = tick.to_string();
        self
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.watch.queue_capacity = capacity;
        self
    }

    pub fn build_cmd(mut self, cmd: &str) -> Self {
        self.config.build.cmd = cmd.to_string();
        self
    }

    pub fn build_quiet_period(mut self, quiet: &str) -> Self {
        self.config.build.quiet_period = quiet.to_string();
        self
    }

    pub fn artifact(mut self, path: &str) -> Self {
        self.config.run.artifact = Some(PathBuf::from(path));
        self
    }

    pub fn arg(mut self, arg: &str) -> Self {
        self.config.run.args.push(arg.to_string());
        self
    }

    pub fn grace(mut self, grace: &str) -> Self {
        self.config.run.grace = grace.to_string();
        self
    }

    pub fn settle(mut self, settle: &str) -> Self {
        self.config.run.settle = settle.to_string();
        self
    }

    pub fn run_on_start(mut self, val: bool) -> Self {
        self.config.run.run_on_start = val;
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}
