// src/watch/filter.rs

//! Second pipeline stage: drops irrelevant changes and collapses bursts.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, trace};

use crate::config::WatchSettings;
use crate::engine::{
    forward, require_next, Debouncer, Flow, Inlet, Stage, StageHandle, DEFAULT_QUEUE_CAPACITY,
};
use crate::engine::debounce::DEFAULT_QUIET_PERIOD;
use crate::errors::Result;
use crate::types::ChangeEvent;
use crate::watch::patterns::FilterRules;

/// Forwards at most one event per quiet period: the last accepted one.
pub struct ChangeFilter {
    rules: FilterRules,
    quiet: Duration,
    tick: Duration,
    inlet: Inlet,
    events: mpsc::Receiver<ChangeEvent>,
}

impl std::fmt::Debug for ChangeFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeFilter")
            .field("rules", &self.rules)
            .field("quiet", &self.quiet)
            .field("tick", &self.tick)
            .finish_non_exhaustive()
    }
}

impl ChangeFilter {
    /// Filter with the default 1s quiet period and tick.
    pub fn new(rules: FilterRules) -> Self {
        Self::with_timing(rules, DEFAULT_QUIET_PERIOD, DEFAULT_QUIET_PERIOD, DEFAULT_QUEUE_CAPACITY)
    }

    pub fn from_settings(rules: FilterRules, settings: &WatchSettings) -> Self {
        Self::with_timing(
            rules,
            settings.quiet_period,
            settings.tick,
            settings.queue_capacity,
        )
    }

    pub fn with_timing(
        rules: FilterRules,
        quiet: Duration,
        tick: Duration,
        capacity: usize,
    ) -> Self {
        let (inlet, events) = Inlet::channel("filter", capacity);
        Self {
            rules,
            quiet,
            tick,
            inlet,
            events,
        }
    }
}

impl Stage for ChangeFilter {
    fn name(&self) -> &'static str {
        "filter"
    }

    fn inlet(&self) -> Option<Inlet> {
        Some(self.inlet.clone())
    }

    fn connect(self: Box<Self>, next: Option<Inlet>) -> Result<StageHandle> {
        let next = require_next("filter", next)?;
        let ChangeFilter {
            rules,
            quiet,
            tick,
            mut events,
            ..
        } = *self;

        Ok(StageHandle::spawn("filter", move |mut cancel| async move {
            let mut debouncer = Debouncer::new(quiet);
            let mut ticker = interval(tick);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                // Queue before tick, so a backlog is folded in before anything
                // is considered settled.
                tokio::select! {
                    biased;
                    _ = &mut cancel => break,
                    event = events.recv() => {
                        let Some(event) = event else { break };
                        let verdict = rules.check(event.path());
                        if verdict.is_accept() {
                            trace!(path = ?event.path(), kind = %event.kind(), "change accepted");
                            debouncer.accept(event, Instant::now());
                        } else {
                            trace!(path = ?event.path(), ?verdict, "change ignored");
                        }
                    }
                    _ = ticker.tick() => {
                        let Some(event) = debouncer.poll(Instant::now()) else { continue };
                        debug!(path = ?event.path(), kind = %event.kind(), "changes settled; forwarding");
                        if let Flow::Stop = forward("filter", &next, event, &mut cancel).await {
                            break;
                        }
                    }
                }
            }
            debug!("filter loop finished");
        }))
    }
}
