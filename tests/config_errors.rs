// tests/config_errors.rs

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use tempfile::NamedTempFile;

use relaunch::config::{load_and_validate, load_or_default};
use relaunch::errors::RelaunchError;

fn config_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

#[test]
fn full_file_is_loaded() {
    let file = config_file(
        r#"
[watch]
extensions = [".go", "tmpl"]
exclude = ["vendor/**", "**/*_gen.go"]
quiet_period = "500ms"
tick = "250ms"
queue_capacity = 4

[build]
cmd = "go build -o bin/server ./cmd/server"
quiet_period = "2s"

[run]
artifact = "bin/server"
args = ["--port", "8080"]
grace = "5s"
settle = "0ms"
run_on_start = false
"#,
    );

    let cfg = load_and_validate(file.path()).unwrap();
    assert_eq!(cfg.watch.extensions, vec!["go", "tmpl"]);
    assert_eq!(cfg.watch.quiet_period, Duration::from_millis(500));
    assert_eq!(cfg.watch.tick, Duration::from_millis(250));
    assert_eq!(cfg.watch.queue_capacity, 4);
    assert_eq!(cfg.build.quiet_period, Duration::from_secs(2));
    assert_eq!(cfg.run.grace, Duration::from_secs(5));
    assert_eq!(cfg.run.settle, Duration::ZERO);
    assert!(!cfg.run.run_on_start);
    assert_eq!(
        cfg.run.artifact_path(Path::new("/src/app")),
        Path::new("/src/app/bin/server")
    );
}

#[test]
fn empty_file_means_defaults() {
    let file = config_file("");
    let cfg = load_and_validate(file.path()).unwrap();

    assert_eq!(cfg.watch.extensions, vec!["go"]);
    assert_eq!(cfg.watch.quiet_period, Duration::from_secs(1));
    assert_eq!(cfg.build.cmd, "go build");
    assert!(cfg.run.run_on_start);
    assert_eq!(
        cfg.run.artifact_path(Path::new("/src/app")),
        Path::new("/src/app/app")
    );
}

#[test]
fn bad_duration_is_a_config_error() {
    let file = config_file("[build]\nquiet_period = \"soon\"\n");
    match load_and_validate(file.path()) {
        Err(RelaunchError::ConfigError(msg)) => assert!(msg.contains("quiet_period")),
        other => panic!("expected ConfigError, got {other:?}"),
    }
}

#[test]
fn bad_exclude_glob_is_a_config_error() {
    let file = config_file("[watch]\nexclude = [\"vendor/[\"]\n");
    assert!(matches!(
        load_and_validate(file.path()),
        Err(RelaunchError::ConfigError(_))
    ));
}

#[test]
fn empty_extension_list_is_rejected() {
    let file = config_file("[watch]\nextensions = []\n");
    assert!(matches!(
        load_and_validate(file.path()),
        Err(RelaunchError::ConfigError(_))
    ));
}

#[test]
fn zero_capacity_is_rejected() {
    let file = config_file("[watch]\nqueue_capacity = 0\n");
    assert!(matches!(
        load_and_validate(file.path()),
        Err(RelaunchError::ConfigError(_))
    ));
}

#[test]
fn zero_grace_is_rejected() {
    let file = config_file("[run]\ngrace = \"0s\"\n");
    match load_and_validate(file.path()) {
        Err(RelaunchError::ConfigError(msg)) => assert!(msg.contains("[run].grace")),
        other => panic!("expected ConfigError, got {other:?}"),
    }
}

#[test]
fn blank_build_command_is_rejected() {
    let file = config_file("[build]\ncmd = \"   \"\n");
    assert!(matches!(
        load_and_validate(file.path()),
        Err(RelaunchError::ConfigError(_))
    ));
}

#[test]
fn malformed_toml_is_a_toml_error() {
    let file = config_file("[watch\nextensions = 3");
    assert!(matches!(
        load_and_validate(file.path()),
        Err(RelaunchError::TomlError(_))
    ));
}

#[test]
fn explicit_missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("Relaunch.toml");
    assert!(matches!(
        load_or_default(Some(&missing)),
        Err(RelaunchError::IoError(_))
    ));
}
