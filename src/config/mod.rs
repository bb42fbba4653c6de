// src/config/mod.rs

//! Optional `Relaunch.toml` configuration: loading, defaults and validation.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_or_default, DEFAULT_CONFIG_FILE};
pub use model::{
    BuildSettings, ConfigFile, RawBuildSection, RawConfigFile, RawRunSection,
    RawWatchSection, RunSettings, WatchSettings,
};
pub use validate::parse_duration;
