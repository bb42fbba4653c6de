// src/exec/backend.rs

//! Pluggable process backends.
//!
//! The build and run stages talk to these traits instead of
//! `tokio::process` directly, so tests can swap in fakes that record what
//! was started and stopped without spawning real processes.
//!
//! - [`ShellBuild`] runs the build command through the platform shell.
//! - [`TokioProcessBackend`] starts the built artifact and hands back a
//!   [`SupervisedProcess`] the run stage can stop and reap.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use anyhow::{anyhow, Context};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::errors::{RelaunchError, Result};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// How a build or supervised process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    Success,
    /// Exit code, or -1 when the process was killed by a signal.
    Failed(i32),
}

impl From<ExitStatus> for ExitOutcome {
    fn from(status: ExitStatus) -> Self {
        if status.success() {
            ExitOutcome::Success
        } else {
            ExitOutcome::Failed(status.code().unwrap_or(-1))
        }
    }
}

/// Runs the project's build to completion.
pub trait BuildBackend: Send + 'static {
    /// Human-readable command, for logs.
    fn describe(&self) -> String;

    /// Run one build and report how it ended.
    ///
    /// `Err` means the build tool could not be started at all, which the
    /// build stage treats as fatal. A build that ran and failed is
    /// `Ok(ExitOutcome::Failed(_))`.
    fn build(&mut self) -> BoxFuture<'_, Result<ExitOutcome>>;
}

/// Starts the supervised executable.
pub trait ProcessBackend: Send + 'static {
    fn spawn(&mut self, program: &Path, args: &[String]) -> anyhow::Result<Box<dyn SupervisedProcess>>;
}

/// A running child owned by the run stage.
pub trait SupervisedProcess: Send {
    fn id(&self) -> Option<u32>;

    /// Resolve when the process exits on its own. Must be cancel safe.
    fn wait(&mut self) -> BoxFuture<'_, anyhow::Result<ExitOutcome>>;

    /// Ask the process to stop, kill it if it has not exited after `grace`,
    /// and wait until it has been reaped.
    ///
    /// Succeeds if the process had already exited.
    fn terminate(&mut self, grace: Duration) -> BoxFuture<'_, anyhow::Result<()>>;
}

/// Exit code `sh` uses for "command not found".
const SHELL_NOT_FOUND: i32 = 127;

/// Build command executed through the platform shell with inherited stdio.
#[derive(Debug, Clone)]
pub struct ShellBuild {
    cmd: String,
    workdir: PathBuf,
}

impl ShellBuild {
    pub fn new(cmd: impl Into<String>, workdir: impl Into<PathBuf>) -> Self {
        Self {
            cmd: cmd.into(),
            workdir: workdir.into(),
        }
    }

    fn command(&self) -> Command {
        // Build a shell command appropriate for the platform.
        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&self.cmd);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(&self.cmd);
            c
        };
        cmd.current_dir(&self.workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        cmd
    }
}

impl BuildBackend for ShellBuild {
    fn describe(&self) -> String {
        self.cmd.clone()
    }

    fn build(&mut self) -> BoxFuture<'_, Result<ExitOutcome>> {
        Box::pin(async move {
            let mut child = self.command().spawn().map_err(|source| RelaunchError::BuildSpawn {
                cmd: self.cmd.clone(),
                source,
            })?;

            let status = child
                .wait()
                .await
                .with_context(|| format!("waiting for build `{}`", self.cmd))?;

            let outcome = ExitOutcome::from(status);
            if !cfg!(windows) && outcome == ExitOutcome::Failed(SHELL_NOT_FOUND) {
                return Err(RelaunchError::BuildSpawn {
                    cmd: self.cmd.clone(),
                    source: io::Error::new(io::ErrorKind::NotFound, "command not found"),
                });
            }
            Ok(outcome)
        })
    }
}

/// Starts the artifact directly (no shell) with inherited stdout/stderr.
#[derive(Debug, Clone, Default)]
pub struct TokioProcessBackend;

impl ProcessBackend for TokioProcessBackend {
    fn spawn(&mut self, program: &Path, args: &[String]) -> anyhow::Result<Box<dyn SupervisedProcess>> {
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("spawning {:?}", program))?;

        Ok(Box::new(TokioProcess { child }))
    }
}

#[derive(Debug)]
struct TokioProcess {
    child: Child,
}

impl SupervisedProcess for TokioProcess {
    fn id(&self) -> Option<u32> {
        self.child.id()
    }

    fn wait(&mut self) -> BoxFuture<'_, anyhow::Result<ExitOutcome>> {
        Box::pin(async move {
            let status = self.child.wait().await.context("waiting for process")?;
            Ok(ExitOutcome::from(status))
        })
    }

    fn terminate(&mut self, grace: Duration) -> BoxFuture<'_, anyhow::Result<()>> {
        Box::pin(async move {
            if let Some(status) = self.child.try_wait()? {
                debug!(?status, "process already exited; nothing to kill");
                return Ok(());
            }

            let pid = self.child.id();
            if let Some(pid) = pid {
                if request_stop(pid).await {
                    if let Ok(status) = tokio::time::timeout(grace, self.child.wait()).await {
                        let status = status.context("reaping stopped process")?;
                        info!(pid, ?status, "process stopped");
                        return Ok(());
                    }
                    warn!(pid, ?grace, "process ignored stop request; killing");
                }
            }

            if let Err(err) = self.child.start_kill() {
                // Lost the race with a natural exit.
                if self.child.try_wait()?.is_some() {
                    return Ok(());
                }
                return Err(anyhow!(err).context(format!("killing process {pid:?}")));
            }

            match tokio::time::timeout(grace, self.child.wait()).await {
                Ok(status) => {
                    let status = status.context("reaping killed process")?;
                    info!(pid, ?status, "process killed");
                    Ok(())
                }
                Err(_) => Err(anyhow!(
                    "process {pid:?} did not exit within {grace:?} of being killed"
                )),
            }
        })
    }
}

/// Ask `pid` to shut down (SIGTERM). Returns false if the request could not
/// be delivered, in which case the caller kills outright.
#[cfg(unix)]
async fn request_stop(pid: u32) -> bool {
    let status = Command::new("kill")
        .arg("-TERM")
        .arg(pid.to_string())
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;

    match status {
        Ok(status) => status.success(),
        Err(err) => {
            debug!(pid, error = %err, "cannot run kill; falling back to forced stop");
            false
        }
    }
}

#[cfg(not(unix))]
async fn request_stop(_pid: u32) -> bool {
    false
}
