// src/engine/pipeline.rs

//! Wiring a linear chain of stages and shutting it down again.

use tracing::{debug, info, warn};

use crate::engine::{Inlet, Stage, StageHandle};
use crate::errors::{RelaunchError, Result};

/// A connected, running chain of stages.
#[derive(Debug)]
pub struct Pipeline {
    /// Handles in chain order (head first).
    handles: Vec<StageHandle>,
}

impl Pipeline {
    /// Connect `stages` head to tail and start every worker.
    ///
    /// Stages are started tail first, so no stage ever forwards into a
    /// successor that is not running yet. Every stage except the head must
    /// accept input.
    pub fn connect(stages: Vec<Box<dyn Stage>>) -> Result<Self> {
        if stages.is_empty() {
            return Err(RelaunchError::ConfigError("pipeline has no stages".into()));
        }

        let mut inlets: Vec<Option<Inlet>> = Vec::with_capacity(stages.len());
        for (idx, stage) in stages.iter().enumerate() {
            let inlet = stage.inlet();
            if idx > 0 && inlet.is_none() {
                return Err(RelaunchError::ConfigError(format!(
                    "stage '{}' cannot follow another stage",
                    stage.name()
                )));
            }
            inlets.push(inlet);
        }

        let names: Vec<&'static str> = stages.iter().map(|s| s.name()).collect();
        let mut handles: Vec<StageHandle> = Vec::with_capacity(stages.len());

        for (idx, stage) in stages.into_iter().enumerate().rev() {
            let next = inlets.get(idx + 1).cloned().flatten();
            match stage.connect(next) {
                Ok(handle) => handles.push(handle),
                Err(err) => {
                    // Dropping the handles cancels the stages already started.
                    drop(handles);
                    return Err(err);
                }
            }
        }
        handles.reverse();

        info!(stages = ?names, "pipeline connected");
        Ok(Self { handles })
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.handles.iter().map(StageHandle::name).collect()
    }

    /// Close every stage, head first, so upstream stops producing before
    /// downstream stops consuming.
    ///
    /// Idempotent. All stages are closed even if one fails; the first
    /// error is returned.
    pub async fn close(&mut self) -> Result<()> {
        let mut first_err = None;
        for handle in &mut self.handles {
            if let Err(err) = handle.close().await {
                warn!(stage = handle.name(), error = %err, "stage did not close cleanly");
                first_err.get_or_insert(err);
            }
        }
        debug!("pipeline closed");
        first_err.map_or(Ok(()), Err)
    }
}
