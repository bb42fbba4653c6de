#![allow(dead_code)]

pub use relaunch_test_utils::builders;
pub use relaunch_test_utils::fakes;
pub use relaunch_test_utils::{capture_logs, init_tracing, with_timeout, write_event};

use std::time::Duration;

use relaunch::engine::Inlet;
use relaunch::types::ChangeEvent;
use tokio::sync::mpsc;

/// An inlet whose events end up in the returned receiver, standing in for
/// the next stage.
pub fn downstream(capacity: usize) -> (Inlet, mpsc::Receiver<ChangeEvent>) {
    Inlet::channel("downstream", capacity)
}

/// Poll `cond` every 50ms until it holds. Pair with `with_timeout`.
pub async fn eventually(mut cond: impl FnMut() -> bool) {
    while !cond() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

/// True if nothing arrives on `rx` within `wait`.
pub async fn stays_quiet(rx: &mut mpsc::Receiver<ChangeEvent>, wait: Duration) -> bool {
    tokio::time::timeout(wait, rx.recv()).await.is_err()
}
