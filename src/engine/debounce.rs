// src/engine/debounce.rs

//! Quiet-period coalescing shared by the filter and build stages.
//!
//! The debouncer is a pure state machine: callers feed it accepted events and
//! poll it on a tick, passing the current time in. It never looks at the
//! clock itself, which keeps it trivially testable.

use std::time::Duration;

use tokio::time::Instant;

use crate::types::ChangeEvent;

/// Default quiet period for both the filter and the build stage.
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_secs(1);

#[derive(Debug)]
pub struct Debouncer {
    quiet: Duration,
    pending: Option<(ChangeEvent, Instant)>,
}

impl Debouncer {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            pending: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Record an accepted event, replacing whatever was pending.
    ///
    /// Returns the superseded event, if any.
    pub fn accept(&mut self, event: ChangeEvent, now: Instant) -> Option<ChangeEvent> {
        self.pending.replace((event, now)).map(|(old, _)| old)
    }

    /// Take the pending event if it has been quiet for at least the quiet
    /// period.
    pub fn poll(&mut self, now: Instant) -> Option<ChangeEvent> {
        match &self.pending {
            Some((_, accepted_at)) if now.duration_since(*accepted_at) >= self.quiet => {
                self.pending.take().map(|(event, _)| event)
            }
            _ => None,
        }
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(DEFAULT_QUIET_PERIOD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::time::SystemTime;

    use crate::types::ChangeKind;

    fn event(path: &str) -> ChangeEvent {
        ChangeEvent::new(path, ChangeKind::Write, SystemTime::now(), None)
    }

    #[test]
    fn nothing_pending_yields_nothing() {
        let mut d = Debouncer::default();
        assert!(d.poll(Instant::now()).is_none());
    }

    #[test]
    fn young_event_is_held_back() {
        let start = Instant::now();
        let mut d = Debouncer::new(Duration::from_secs(1));
        d.accept(event("/a.go"), start);

        assert!(d.poll(start + Duration::from_millis(999)).is_none());
        assert!(d.is_pending());
        let out = d.poll(start + Duration::from_secs(1)).unwrap();
        assert_eq!(out.path(), Path::new("/a.go"));
        assert!(!d.is_pending());
    }

    #[test]
    fn newer_event_wins_and_restarts_the_window() {
        let start = Instant::now();
        let mut d = Debouncer::new(Duration::from_secs(1));
        d.accept(event("/a.go"), start);
        let superseded = d.accept(event("/b.go"), start + Duration::from_millis(800));
        assert_eq!(superseded.unwrap().path(), Path::new("/a.go"));

        // 1s after the first event, but only 200ms after the second.
        assert!(d.poll(start + Duration::from_secs(1)).is_none());
        let out = d.poll(start + Duration::from_millis(1800)).unwrap();
        assert_eq!(out.path(), Path::new("/b.go"));
    }

    #[test]
    fn forwarded_event_is_not_repeated() {
        let start = Instant::now();
        let mut d = Debouncer::new(Duration::from_millis(10));
        d.accept(event("/a.go"), start);

        assert!(d.poll(start + Duration::from_secs(1)).is_some());
        assert!(d.poll(start + Duration::from_secs(2)).is_none());
    }
}
