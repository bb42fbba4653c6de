// src/config/validate.rs

use std::time::Duration;

use crate::config::model::{
    BuildSettings, ConfigFile, RawConfigFile, RunSettings, WatchSettings,
};
use crate::errors::{RelaunchError, Result};
use crate::watch::patterns::build_globset;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::RelaunchError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        let watch = validate_watch(raw.watch)?;
        let build = validate_build(raw.build)?;
        let run = validate_run(raw.run)?;
        Ok(ConfigFile::new_unchecked(watch, build, run))
    }
}

fn validate_watch(raw: crate::config::model::RawWatchSection) -> Result<WatchSettings> {
    let extensions: Vec<String> = raw
        .extensions
        .iter()
        .map(|e| e.trim().trim_start_matches('.').to_string())
        .filter(|e| !e.is_empty())
        .collect();
    if extensions.is_empty() {
        return Err(RelaunchError::ConfigError(
            "[watch].extensions must name at least one extension".to_string(),
        ));
    }

    build_globset(&raw.exclude).map_err(|e| {
        RelaunchError::ConfigError(format!("[watch].exclude: {e:#}"))
    })?;

    if raw.queue_capacity == 0 {
        return Err(RelaunchError::ConfigError(
            "[watch].queue_capacity must be >= 1 (got 0)".to_string(),
        ));
    }

    let tick = duration_field("[watch].tick", &raw.tick)?;
    if tick.is_zero() {
        return Err(RelaunchError::ConfigError(
            "[watch].tick must be greater than zero".to_string(),
        ));
    }

    Ok(WatchSettings {
        extensions,
        exclude: raw.exclude,
        quiet_period: duration_field("[watch].quiet_period", &raw.quiet_period)?,
        tick,
        queue_capacity: raw.queue_capacity,
    })
}

fn validate_build(raw: crate::config::model::RawBuildSection) -> Result<BuildSettings> {
    if raw.cmd.trim().is_empty() {
        return Err(RelaunchError::ConfigError(
            "[build].cmd must not be empty".to_string(),
        ));
    }

    Ok(BuildSettings {
        cmd: raw.cmd,
        quiet_period: duration_field("[build].quiet_period", &raw.quiet_period)?,
    })
}

fn validate_run(raw: crate::config::model::RawRunSection) -> Result<RunSettings> {
    let grace = duration_field("[run].grace", &raw.grace)?;
    if grace.is_zero() {
        return Err(RelaunchError::ConfigError(
            "[run].grace must be greater than zero".to_string(),
        ));
    }

    Ok(RunSettings {
        artifact: raw.artifact,
        args: raw.args,
        grace,
        settle: duration_field("[run].settle", &raw.settle)?,
        run_on_start: raw.run_on_start,
    })
}

fn duration_field(field: &str, value: &str) -> Result<Duration> {
    parse_duration(value).map_err(|e| RelaunchError::ConfigError(format!("{field}: {e}")))
}

/// Parse a simple duration string like `"3s"`, `"250ms"`, `"1m"`, `"2h"`.
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    // Find the boundary between digits and suffix.
    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| "duration missing unit suffix".to_string())?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    match unit.as_str() {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => Ok(Duration::from_secs(value * 60)),
        "h" => Ok(Duration::from_secs(value * 60 * 60)),
        _ => Err(format!(
            "unsupported duration unit '{}'; expected ms, s, m, or h",
            unit
        )),
    }
}
