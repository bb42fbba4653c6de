// src/exec/run.rs

//! Fourth pipeline stage: keeps at most one instance of the built artifact
//! running, restarting it for every successful build.

use std::future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::RunSettings;
use crate::engine::{Inlet, Stage, StageHandle, DEFAULT_QUEUE_CAPACITY};
use crate::errors::Result;
use crate::exec::backend::{ExitOutcome, ProcessBackend, SupervisedProcess};
use crate::fs::FileSystem;
use crate::types::ChangeEvent;

/// Supervises the artifact process. Terminal in practice: it forwards nothing.
pub struct RunStage {
    supervisor: Supervisor,
    run_on_start: bool,
    inlet: Inlet,
    events: mpsc::Receiver<ChangeEvent>,
}

impl std::fmt::Debug for RunStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunStage")
            .field("artifact", &self.supervisor.artifact)
            .field("args", &self.supervisor.args)
            .field("run_on_start", &self.run_on_start)
            .finish_non_exhaustive()
    }
}

impl RunStage {
    pub fn new(
        backend: impl ProcessBackend,
        fs: Arc<dyn FileSystem>,
        artifact: impl Into<PathBuf>,
        settings: &RunSettings,
    ) -> Self {
        Self::with_capacity(backend, fs, artifact, settings, DEFAULT_QUEUE_CAPACITY)
    }

    pub fn with_capacity(
        backend: impl ProcessBackend,
        fs: Arc<dyn FileSystem>,
        artifact: impl Into<PathBuf>,
        settings: &RunSettings,
        capacity: usize,
    ) -> Self {
        let (inlet, events) = Inlet::channel("run", capacity);
        Self {
            supervisor: Supervisor {
                backend: Box::new(backend),
                fs,
                artifact: artifact.into(),
                args: settings.args.clone(),
                grace: settings.grace,
                settle: settings.settle,
                child: None,
            },
            run_on_start: settings.run_on_start,
            inlet,
            events,
        }
    }
}

impl Stage for RunStage {
    fn name(&self) -> &'static str {
        "run"
    }

    fn inlet(&self) -> Option<Inlet> {
        Some(self.inlet.clone())
    }

    fn connect(self: Box<Self>, next: Option<Inlet>) -> Result<StageHandle> {
        if let Some(next) = next {
            debug!(next = next.stage(), "run stage forwards nothing; successor unused");
        }
        let RunStage {
            mut supervisor,
            run_on_start,
            mut events,
            ..
        } = *self;

        Ok(StageHandle::spawn("run", move |mut cancel| async move {
            if run_on_start {
                supervisor.restart().await;
            }

            loop {
                tokio::select! {
                    biased;
                    _ = &mut cancel => break,
                    event = events.recv() => {
                        let Some(event) = event else { break };
                        // Everything already queued folds into this restart.
                        let mut collapsed = 0usize;
                        while events.try_recv().is_ok() {
                            collapsed += 1;
                        }
                        info!(trigger = %event, collapsed, "restart requested");
                        supervisor.restart().await;
                    }
                    (pid, exit) = wait_for_exit(&mut supervisor.child) => {
                        match exit {
                            Ok(ExitOutcome::Success) => info!(pid, "process exited"),
                            Ok(ExitOutcome::Failed(code)) => {
                                warn!(pid, exit_code = code, "process exited with failure");
                            }
                            Err(err) => warn!(pid, error = %err, "lost track of process"),
                        }
                        supervisor.child = None;
                    }
                }
            }

            supervisor.stop().await;
            debug!("run loop finished");
        }))
    }
}

/// Resolves with the pid and outcome when the supervised child exits;
/// never resolves without one.
///
/// The pid is read up front since a reaped child no longer reports one.
async fn wait_for_exit(
    child: &mut Option<Box<dyn SupervisedProcess>>,
) -> (Option<u32>, anyhow::Result<ExitOutcome>) {
    match child {
        Some(child) => {
            let pid = child.id();
            (pid, child.wait().await)
        }
        None => future::pending().await,
    }
}

/// Owns the process handle. Only the run worker touches it.
struct Supervisor {
    backend: Box<dyn ProcessBackend>,
    fs: Arc<dyn FileSystem>,
    artifact: PathBuf,
    args: Vec<String>,
    grace: Duration,
    settle: Duration,
    child: Option<Box<dyn SupervisedProcess>>,
}

impl Supervisor {
    /// Stop the current process (if any), then start the artifact afresh.
    async fn restart(&mut self) {
        if self.child.is_some() {
            if !self.stop().await {
                warn!(artifact = ?self.artifact, "previous process still alive; not starting another");
                return;
            }
            tokio::time::sleep(self.settle).await;
        }

        if !self.fs.is_file(&self.artifact) {
            info!(artifact = ?self.artifact, "artifact missing, awaiting successful build");
            return;
        }

        match self.backend.spawn(&self.artifact, &self.args) {
            Ok(child) => {
                info!(pid = child.id(), artifact = ?self.artifact, "process started");
                self.child = Some(child);
            }
            Err(err) => {
                warn!(artifact = ?self.artifact, error = %err, "failed to start process");
            }
        }
    }

    /// Terminate the current process. Returns false if it could not be
    /// confirmed dead, in which case the handle is kept.
    async fn stop(&mut self) -> bool {
        let Some(mut child) = self.child.take() else {
            return true;
        };
        let pid = child.id();
        info!(pid, "stopping process");

        match child.terminate(self.grace).await {
            Ok(()) => true,
            Err(err) => {
                warn!(pid, error = %err, "failed to stop process");
                self.child = Some(child);
                false
            }
        }
    }
}
