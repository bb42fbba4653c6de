// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod types;
pub mod watch;

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::{load_or_default, ConfigFile};
use crate::engine::{Pipeline, Sink, Stage};
use crate::errors::{RelaunchError, Result};
use crate::exec::{BuildBackend, BuildStage, ProcessBackend, RunStage, ShellBuild, TokioProcessBackend};
use crate::fs::{FileSystem, RealFileSystem};
use crate::types::RawNotification;
use crate::watch::{ChangeFilter, DirectoryWatcher, FilterRules, NotificationSource, NotifySource};

/// The external collaborators a pipeline is assembled from.
///
/// Production uses `notify`, the shell and `tokio::process`; tests pass fakes.
pub struct Collaborators<S, B, P> {
    pub source: S,
    pub notifications: mpsc::UnboundedReceiver<RawNotification>,
    pub fs: Arc<dyn FileSystem>,
    pub build: B,
    pub processes: P,
}

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and root resolution
/// - watcher -> filter -> build -> run -> sink
/// - Ctrl-C / SIGTERM handling
///
/// Returns when interrupted, or with the error that stopped the pipeline.
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = load_or_default(args.config.as_deref())?;
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);

    let workdir = working_dir()?;
    let roots = resolve_roots(fs.as_ref(), &workdir, &args.roots)?;
    let artifact = cfg.run.artifact_path(&workdir);

    if args.dry_run {
        print_dry_run(&cfg, &roots, &artifact);
        return Ok(());
    }

    let (source, notifications) = NotifySource::new()?;
    let parts = Collaborators {
        source,
        notifications,
        fs,
        build: ShellBuild::new(cfg.build.cmd.clone(), &workdir),
        processes: TokioProcessBackend,
    };

    let shutdown = shutdown_signal()?;
    let (fatal_tx, mut fatal_rx) = mpsc::channel::<RelaunchError>(1);
    let mut pipeline = assemble(&cfg, &roots, artifact, parts, fatal_tx)?;

    let outcome = tokio::select! {
        res = shutdown => res,
        Some(err) = fatal_rx.recv() => Err(err),
    };

    let closed = pipeline.close().await;
    outcome.and(closed)
}

/// Install the shutdown handlers and return a future that resolves on the
/// first request: SIGINT or SIGTERM on unix, Ctrl-C elsewhere.
///
/// Handlers are registered before any child is started so a stop request
/// always reaches `Pipeline::close`.
fn shutdown_signal() -> Result<impl Future<Output = Result<()>>> {
    #[cfg(unix)]
    let (mut sigint, mut sigterm) = {
        use tokio::signal::unix::{signal, SignalKind};
        (signal(SignalKind::interrupt())?, signal(SignalKind::terminate())?)
    };

    Ok(async move {
        #[cfg(unix)]
        {
            tokio::select! {
                _ = sigint.recv() => {
                    info!("interrupt received; shutting down");
                }
                _ = sigterm.recv() => {
                    info!("SIGTERM received; shutting down");
                }
            }
        }

        #[cfg(not(unix))]
        {
            tokio::signal::ctrl_c().await?;
            info!("interrupt received; shutting down");
        }

        Ok::<(), RelaunchError>(())
    })
}

/// Build and connect the full stage chain.
pub fn assemble<S, B, P>(
    cfg: &ConfigFile,
    roots: &[PathBuf],
    artifact: PathBuf,
    parts: Collaborators<S, B, P>,
    fatal: mpsc::Sender<RelaunchError>,
) -> Result<Pipeline>
where
    S: NotificationSource,
    B: BuildBackend,
    P: ProcessBackend,
{
    let Collaborators {
        source,
        notifications,
        fs,
        build,
        processes,
    } = parts;

    let rules = FilterRules::from_settings(&cfg.watch, roots.to_vec())?;
    let capacity = cfg.watch.queue_capacity;

    let stages: Vec<Box<dyn Stage>> = vec![
        Box::new(DirectoryWatcher::new(roots, source, notifications, fs.clone())?),
        Box::new(ChangeFilter::from_settings(rules, &cfg.watch)),
        Box::new(
            BuildStage::with_capacity(build, &cfg.build, cfg.watch.tick, capacity).with_fatal(fatal),
        ),
        Box::new(RunStage::with_capacity(processes, fs, artifact, &cfg.run, capacity)),
        Box::new(Sink::new()),
    ];

    Pipeline::connect(stages)
}

/// `$PWD` when it names a directory, otherwise the process cwd.
pub fn working_dir() -> Result<PathBuf> {
    if let Some(pwd) = std::env::var_os("PWD").map(PathBuf::from) {
        if pwd.is_absolute() && pwd.is_dir() {
            return Ok(pwd);
        }
    }
    std::env::current_dir().map_err(|err| {
        RelaunchError::ConfigError(format!("cannot determine working directory: {err}"))
    })
}

/// Make every root absolute and canonical; a root that cannot be resolved
/// is a configuration error.
pub fn resolve_roots(fs: &dyn FileSystem, workdir: &Path, roots: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut resolved: Vec<PathBuf> = Vec::with_capacity(roots.len());
    for root in roots {
        let joined = workdir.join(root);
        let canonical = fs.canonicalize(&joined).map_err(|err| {
            RelaunchError::ConfigError(format!("watch root {:?}: {err:#}", root))
        })?;
        if !resolved.contains(&canonical) {
            resolved.push(canonical);
        }
    }
    debug!(?resolved, "resolved watch roots");
    Ok(resolved)
}

fn print_dry_run(cfg: &ConfigFile, roots: &[PathBuf], artifact: &Path) {
    println!("relaunch dry-run");
    println!("roots ({}):", roots.len());
    for root in roots {
        println!("  - {}", root.display());
    }
    println!();

    println!("watch:");
    println!("  extensions: {:?}", cfg.watch.extensions);
    if !cfg.watch.exclude.is_empty() {
        println!("  exclude: {:?}", cfg.watch.exclude);
    }
    println!("  quiet_period: {:?}", cfg.watch.quiet_period);
    println!("  tick: {:?}", cfg.watch.tick);
    println!("  queue_capacity: {}", cfg.watch.queue_capacity);

    println!("build:");
    println!("  cmd: {}", cfg.build.cmd);
    println!("  quiet_period: {:?}", cfg.build.quiet_period);

    println!("run:");
    println!("  artifact: {}", artifact.display());
    if !cfg.run.args.is_empty() {
        println!("  args: {:?}", cfg.run.args);
    }
    println!("  grace: {:?}", cfg.run.grace);
    println!("  settle: {:?}", cfg.run.settle);
    println!("  run_on_start: {}", cfg.run.run_on_start);

    debug!("dry-run complete (nothing watched)");
}
