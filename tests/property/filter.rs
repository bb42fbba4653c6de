use std::path::{Path, PathBuf};
use std::time::SystemTime;

use proptest::prelude::*;
use tokio::time::{Duration, Instant};

use relaunch::engine::Debouncer;
use relaunch::types::{ChangeEvent, ChangeKind};
use relaunch::watch::{FilterRules, Verdict};

fn rules() -> FilterRules {
    FilterRules::new(["go"], &["gen/**".to_string()], vec![PathBuf::from("/proj")]).unwrap()
}

// Base name: optional leading dot, a stem, one extension from a small pool.
fn file_name() -> impl Strategy<Value = (bool, String, &'static str)> {
    (
        any::<bool>(),
        "[a-z][a-z0-9_]{0,8}",
        prop::sample::select(vec!["go", "md", "txt", "gox", "swp", ""]),
    )
}

#[derive(Debug, Clone)]
enum Op {
    /// Advance the clock by this many ms, then accept a fresh event.
    Accept(u64),
    /// Advance the clock by this many ms, then poll.
    Poll(u64),
}

fn ops() -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(
        prop_oneof![
            (0u64..1500).prop_map(Op::Accept),
            (0u64..1500).prop_map(Op::Poll),
        ],
        0..60,
    )
}

fn event(n: usize) -> ChangeEvent {
    ChangeEvent::new(
        format!("/proj/f{n}.go"),
        ChangeKind::Write,
        SystemTime::now(),
        None,
    )
}

proptest! {
    /// Only visible files with the configured extension outside excluded
    /// trees are accepted.
    #[test]
    fn filter_accepts_exactly_visible_matching_files(
        (hidden, stem, ext) in file_name(),
        generated in any::<bool>(),
    ) {
        let mut name = String::new();
        if hidden {
            name.push('.');
        }
        name.push_str(&stem);
        if !ext.is_empty() {
            name.push('.');
            name.push_str(ext);
        }
        let dir = if generated { "/proj/gen/api" } else { "/proj/pkg" };
        let path = Path::new(dir).join(&name);

        let verdict = rules().check(&path);
        let expected = !hidden && ext == "go" && !generated;
        prop_assert_eq!(verdict.is_accept(), expected, "{:?} -> {:?}", path, verdict);
        if hidden {
            prop_assert_eq!(verdict, Verdict::Hidden);
        }
    }

    /// The debouncer never emits more than it accepted, never emits the same
    /// acceptance twice, and only emits the most recent one after a full
    /// quiet period.
    #[test]
    fn debouncer_never_amplifies(ops in ops()) {
        let quiet = Duration::from_secs(1);
        let mut debouncer = Debouncer::new(quiet);
        let mut now = Instant::now();

        let mut accepted = 0usize;
        let mut emitted = 0usize;
        let mut last: Option<(usize, Instant)> = None;

        for op in ops {
            match op {
                Op::Accept(ms) => {
                    now += Duration::from_millis(ms);
                    debouncer.accept(event(accepted), now);
                    last = Some((accepted, now));
                    accepted += 1;
                }
                Op::Poll(ms) => {
                    now += Duration::from_millis(ms);
                    if let Some(ev) = debouncer.poll(now) {
                        let (n, at) = last.take().expect("emitted without pending event");
                        let expected = format!("/proj/f{n}.go");
                        prop_assert_eq!(ev.path(), Path::new(&expected));
                        prop_assert!(now.duration_since(at) >= quiet);
                        emitted += 1;
                    } else if let Some((_, at)) = last {
                        prop_assert!(now.duration_since(at) < quiet);
                    }
                }
            }
        }

        prop_assert!(emitted <= accepted);
        prop_assert_eq!(debouncer.is_pending(), last.is_some());
    }
}
