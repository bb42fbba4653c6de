// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `relaunch`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "relaunch",
    version,
    about = "Rebuild and restart a program whenever its sources change.",
    long_about = None
)]
pub struct CliArgs {
    /// Directories to watch, recursively.
    #[arg(value_name = "ROOT", default_value = ".")]
    pub roots: Vec<PathBuf>,

    /// Path to the config file (TOML).
    ///
    /// Default: `Relaunch.toml` in the current working directory, if present.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `RELAUNCH_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Print the resolved settings, but don't watch or run anything.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roots_default_to_current_directory() {
        let args = CliArgs::parse_from(["relaunch"]);
        assert_eq!(args.roots, vec![PathBuf::from(".")]);
        assert!(args.config.is_none());
        assert!(!args.dry_run);
    }

    #[test]
    fn multiple_roots_and_flags() {
        let args = CliArgs::parse_from([
            "relaunch",
            "cmd",
            "internal",
            "--config",
            "dev.toml",
            "--log-level",
            "debug",
            "--dry-run",
        ]);
        assert_eq!(args.roots, vec![PathBuf::from("cmd"), PathBuf::from("internal")]);
        assert_eq!(args.config, Some(PathBuf::from("dev.toml")));
        assert!(matches!(args.log_level, Some(LogLevel::Debug)));
        assert!(args.dry_run);
    }
}
