// src/engine/sink.rs

//! Chain terminator: records whatever reaches it and forwards nothing.

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::engine::{DEFAULT_QUEUE_CAPACITY, Inlet, Stage, StageHandle};
use crate::errors::Result;
use crate::types::ChangeEvent;

pub struct Sink {
    inlet: Inlet,
    events: mpsc::Receiver<ChangeEvent>,
}

impl Sink {
    pub fn new() -> Self {
        let (inlet, events) = Inlet::channel("sink", DEFAULT_QUEUE_CAPACITY);
        Self { inlet, events }
    }
}

impl Default for Sink {
    fn default() -> Self {
        Self::new()
    }
}

impl Stage for Sink {
    fn name(&self) -> &'static str {
        "sink"
    }

    fn inlet(&self) -> Option<Inlet> {
        Some(self.inlet.clone())
    }

    fn connect(self: Box<Self>, next: Option<Inlet>) -> Result<StageHandle> {
        if let Some(next) = next {
            debug!(next = next.stage(), "sink has no successor; ignoring");
        }

        let Sink { mut events, .. } = *self;
        Ok(StageHandle::spawn("sink", move |mut cancel| async move {
            loop {
                tokio::select! {
                    biased;
                    _ = &mut cancel => break,
                    event = events.recv() => match event {
                        Some(event) => info!(
                            target: "relaunch::sink",
                            kind = %event.kind(),
                            path = ?event.path(),
                            "pipeline event"
                        ),
                        None => break,
                    },
                }
            }
            debug!("sink loop finished");
        }))
    }
}
