// src/engine/mod.rs

//! Stage plumbing shared by every part of the pipeline.
//!
//! A pipeline is a strictly linear chain of stages. Each stage:
//! - exposes an [`Inlet`] its predecessor forwards events into (bounded
//!   queue, so a full stage blocks the sender),
//! - is started with [`Stage::connect`], which hands it the successor's inlet
//!   and spawns its worker,
//! - is stopped through the [`StageHandle`] returned by `connect`.
//!
//! The debounce policy shared by the filter and build stages lives in
//! [`debounce`]; wiring of the concrete chain lives in [`pipeline`].

use std::fmt;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::errors::{RelaunchError, Result};
use crate::types::ChangeEvent;

pub mod debounce;
pub mod pipeline;
pub mod sink;

pub use debounce::Debouncer;
pub use pipeline::Pipeline;
pub use sink::Sink;

/// Default capacity of a stage's inbound queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 16;

/// Cloneable entry point into a stage's inbound queue.
#[derive(Clone)]
pub struct Inlet {
    stage: &'static str,
    tx: mpsc::Sender<ChangeEvent>,
}

impl fmt::Debug for Inlet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Inlet").field("stage", &self.stage).finish()
    }
}

impl Inlet {
    /// Create a bounded queue and return its sending half as an inlet.
    pub fn channel(
        stage: &'static str,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<ChangeEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { stage, tx }, rx)
    }

    pub fn stage(&self) -> &'static str {
        self.stage
    }

    /// Hand an event to the stage, waiting while its queue is full.
    ///
    /// Fails only when the stage's worker has exited.
    pub async fn handle(&self, event: ChangeEvent) -> Result<()> {
        self.tx
            .send(event)
            .await
            .map_err(|_| RelaunchError::StageClosed(self.stage))
    }
}

/// The capability every pipeline stage provides.
pub trait Stage: Send {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Queue the predecessor forwards into.
    ///
    /// `None` for stages fed by something other than a predecessor (the
    /// directory watcher is fed by the notification source).
    fn inlet(&self) -> Option<Inlet>;

    /// Wire the successor and start this stage's worker.
    ///
    /// `next` is `None` only for the last stage of a chain.
    fn connect(self: Box<Self>, next: Option<Inlet>) -> Result<StageHandle>;
}

/// What a worker loop should do after trying to forward an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// Forward `event` to `next`, giving up if the stage is cancelled while the
/// successor's queue is full.
pub async fn forward(
    stage: &'static str,
    next: &Inlet,
    event: ChangeEvent,
    cancel: &mut oneshot::Receiver<()>,
) -> Flow {
    tokio::select! {
        biased;
        _ = cancel => Flow::Stop,
        res = next.handle(event) => match res {
            Ok(()) => Flow::Continue,
            Err(err) => {
                warn!(stage, error = %err, "successor gone; stopping");
                Flow::Stop
            }
        },
    }
}

/// Successor for stages that cannot be last in the chain.
pub fn require_next(stage: &'static str, next: Option<Inlet>) -> Result<Inlet> {
    next.ok_or_else(|| RelaunchError::ConfigError(format!("stage '{stage}' needs a successor")))
}

/// Handle to a running stage worker.
///
/// Dropping the handle drops the cancellation sender, which the worker treats
/// the same as an explicit close (without waiting for it to finish).
pub struct StageHandle {
    name: &'static str,
    cancel: Option<oneshot::Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl fmt::Debug for StageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageHandle")
            .field("name", &self.name)
            .field("closed", &self.cancel.is_none())
            .finish()
    }
}

impl StageHandle {
    /// Spawn `worker`, handing it the receiving half of the stage's
    /// cancellation signal.
    pub fn spawn<F, Fut>(name: &'static str, worker: F) -> Self
    where
        F: FnOnce(oneshot::Receiver<()>) -> Fut,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let worker = tokio::spawn(worker(cancel_rx));
        Self {
            name,
            cancel: Some(cancel_tx),
            worker: Some(worker),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_finished(&self) -> bool {
        self.worker.as_ref().is_none_or(|w| w.is_finished())
    }

    /// Signal the worker to stop and wait until it has exited.
    ///
    /// Safe to call more than once; later calls return immediately.
    pub async fn close(&mut self) -> Result<()> {
        let Some(cancel) = self.cancel.take() else {
            debug!(stage = self.name, "close called on already closed stage");
            return Ok(());
        };

        if cancel.send(()).is_err() {
            debug!(stage = self.name, "stage worker already gone before close");
        }

        if let Some(worker) = self.worker.take() {
            if let Err(err) = worker.await {
                warn!(stage = self.name, error = %err, "stage worker ended abnormally");
                return Err(RelaunchError::Other(err.into()));
            }
        }

        debug!(stage = self.name, "stage closed");
        Ok(())
    }
}
