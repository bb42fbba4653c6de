// src/exec/build.rs

//! Third pipeline stage: rebuilds the project and forwards successful builds.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::BuildSettings;
use crate::engine::{
    forward, require_next, Debouncer, Flow, Inlet, Stage, StageHandle, DEFAULT_QUEUE_CAPACITY,
};
use crate::errors::{RelaunchError, Result};
use crate::exec::backend::{BuildBackend, ExitOutcome};
use crate::types::ChangeEvent;

/// Runs one build per inbound event and forwards the last successful one once
/// builds have been quiet for the configured period.
pub struct BuildStage {
    backend: Box<dyn BuildBackend>,
    quiet: Duration,
    tick: Duration,
    fatal: Option<mpsc::Sender<RelaunchError>>,
    inlet: Inlet,
    events: mpsc::Receiver<ChangeEvent>,
}

impl std::fmt::Debug for BuildStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildStage")
            .field("cmd", &self.backend.describe())
            .field("quiet", &self.quiet)
            .field("tick", &self.tick)
            .finish_non_exhaustive()
    }
}

impl BuildStage {
    pub fn new(backend: impl BuildBackend, settings: &BuildSettings, tick: Duration) -> Self {
        Self::with_capacity(backend, settings, tick, DEFAULT_QUEUE_CAPACITY)
    }

    pub fn with_capacity(
        backend: impl BuildBackend,
        settings: &BuildSettings,
        tick: Duration,
        capacity: usize,
    ) -> Self {
        let (inlet, events) = Inlet::channel("build", capacity);
        Self {
            backend: Box::new(backend),
            quiet: settings.quiet_period,
            tick,
            fatal: None,
            inlet,
            events,
        }
    }

    /// Where to report a build tool that cannot be started at all.
    ///
    /// Without one the error is only logged and the stage stops.
    pub fn with_fatal(mut self, fatal: mpsc::Sender<RelaunchError>) -> Self {
        self.fatal = Some(fatal);
        self
    }
}

impl Stage for BuildStage {
    fn name(&self) -> &'static str {
        "build"
    }

    fn inlet(&self) -> Option<Inlet> {
        Some(self.inlet.clone())
    }

    fn connect(self: Box<Self>, next: Option<Inlet>) -> Result<StageHandle> {
        let next = require_next("build", next)?;
        let BuildStage {
            mut backend,
            quiet,
            tick,
            fatal,
            mut events,
            ..
        } = *self;

        Ok(StageHandle::spawn("build", move |mut cancel| async move {
            let cmd = backend.describe();
            let mut debouncer = Debouncer::new(quiet);
            let mut ticker = interval(tick);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = &mut cancel => break,
                    event = events.recv() => {
                        let Some(event) = event else { break };
                        info!(cmd = %cmd, trigger = %event, "building");

                        // Dropping the build future kills the child.
                        let outcome = tokio::select! {
                            biased;
                            _ = &mut cancel => {
                                info!(cmd = %cmd, "build aborted by shutdown");
                                break;
                            }
                            outcome = backend.build() => outcome,
                        };

                        match outcome {
                            Ok(ExitOutcome::Success) => {
                                info!(cmd = %cmd, "build succeeded");
                                debouncer.accept(event, Instant::now());
                            }
                            Ok(ExitOutcome::Failed(code)) => {
                                warn!(cmd = %cmd, exit_code = code, "build failed; not restarting");
                            }
                            Err(err) => {
                                error!(cmd = %cmd, error = %err, "cannot run build command");
                                if let Some(fatal) = &fatal {
                                    if fatal.try_send(err).is_err() {
                                        debug!("fatal channel full or closed");
                                    }
                                }
                                break;
                            }
                        }
                    }
                    _ = ticker.tick() => {
                        let Some(event) = debouncer.poll(Instant::now()) else { continue };
                        debug!(path = ?event.path(), "build settled; forwarding");
                        if let Flow::Stop = forward("build", &next, event, &mut cancel).await {
                            break;
                        }
                    }
                }
            }
            debug!("build loop finished");
        }))
    }
}
