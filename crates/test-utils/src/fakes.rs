//! Fakes for every external collaborator of the pipeline.
//!
//! All of them are cheap to clone; clones share state, so a test keeps one
//! copy for assertions and hands the other to the code under test.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use tokio::sync::{mpsc, oneshot};

use relaunch::errors::{RelaunchError, Result};
use relaunch::exec::backend::BoxFuture;
use relaunch::exec::{BuildBackend, ExitOutcome, ProcessBackend, SupervisedProcess};
use relaunch::types::RawNotification;
use relaunch::watch::NotificationSource;

// ---------------------------------------------------------------------------
// Notification source
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceCall {
    Register(PathBuf),
    Unregister(PathBuf),
}

#[derive(Debug, Default)]
struct SourceState {
    calls: Vec<SourceCall>,
    registered: BTreeSet<PathBuf>,
    refuse: HashSet<PathBuf>,
}

/// Records registrations; notifications are injected by the test.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSource {
    state: Arc<Mutex<SourceState>>,
}

impl ScriptedSource {
    /// The source, a sender to inject notifications with, and the stream to
    /// hand to the directory watcher.
    pub fn channel() -> (
        Self,
        mpsc::UnboundedSender<RawNotification>,
        mpsc::UnboundedReceiver<RawNotification>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::default(), tx, rx)
    }

    /// Make `register` fail for `dir`.
    pub fn refuse(&self, dir: impl Into<PathBuf>) {
        self.state.lock().unwrap().refuse.insert(dir.into());
    }

    pub fn calls(&self) -> Vec<SourceCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn registered(&self) -> Vec<PathBuf> {
        self.state.lock().unwrap().registered.iter().cloned().collect()
    }

    pub fn is_registered(&self, dir: impl AsRef<Path>) -> bool {
        self.state.lock().unwrap().registered.contains(dir.as_ref())
    }
}

impl NotificationSource for ScriptedSource {
    fn register(&mut self, dir: &Path) -> anyhow::Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.refuse.contains(dir) {
            return Err(anyhow!("permission denied: {:?}", dir));
        }
        state.calls.push(SourceCall::Register(dir.to_path_buf()));
        state.registered.insert(dir.to_path_buf());
        Ok(())
    }

    fn unregister(&mut self, dir: &Path) -> anyhow::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(SourceCall::Unregister(dir.to_path_buf()));
        state.registered.remove(dir);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Build backend
// ---------------------------------------------------------------------------

/// What one fake build does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStep {
    Exit(ExitOutcome),
    /// The build tool cannot be started.
    SpawnError,
}

/// Replays scripted build results, then repeats `fallback`.
#[derive(Debug, Clone)]
pub struct FakeBuild {
    script: Arc<Mutex<VecDeque<BuildStep>>>,
    fallback: BuildStep,
    duration: Duration,
    calls: Arc<AtomicUsize>,
}

impl FakeBuild {
    /// Every build succeeds.
    pub fn succeeding() -> Self {
        Self::scripted([], BuildStep::Exit(ExitOutcome::Success))
    }

    /// Every build exits with `code`.
    pub fn failing(code: i32) -> Self {
        Self::scripted([], BuildStep::Exit(ExitOutcome::Failed(code)))
    }

    pub fn scripted(steps: impl IntoIterator<Item = BuildStep>, fallback: BuildStep) -> Self {
        Self {
            script: Arc::new(Mutex::new(steps.into_iter().collect())),
            fallback,
            duration: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Make every build take `duration` of (tokio) time.
    pub fn taking(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl BuildBackend for FakeBuild {
    fn describe(&self) -> String {
        "fake build".to_string()
    }

    fn build(&mut self) -> BoxFuture<'_, Result<ExitOutcome>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self.script.lock().unwrap().pop_front().unwrap_or(self.fallback);
        let duration = self.duration;

        Box::pin(async move {
            if !duration.is_zero() {
                tokio::time::sleep(duration).await;
            }
            match step {
                BuildStep::Exit(outcome) => Ok(outcome),
                BuildStep::SpawnError => Err(RelaunchError::BuildSpawn {
                    cmd: "fake build".to_string(),
                    source: io::Error::new(io::ErrorKind::NotFound, "no such tool"),
                }),
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Process backend
// ---------------------------------------------------------------------------

/// Lifecycle events of fake processes, in the order they happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcEvent {
    Spawned(u32),
    Terminated(u32),
    Exited(u32),
    /// Handle dropped while the process was still alive.
    Dropped(u32),
    /// `terminate` was refused; the process is still alive.
    StopFailed(u32),
}

#[derive(Debug, Default)]
struct ProcState {
    next_pid: u32,
    live: usize,
    max_live: usize,
    launches: Vec<(PathBuf, Vec<String>)>,
    events: Vec<ProcEvent>,
    exits: HashMap<u32, oneshot::Sender<ExitOutcome>>,
    refuse_spawn: bool,
    refuse_terminate: bool,
}

impl ProcState {
    fn died(&mut self, event: ProcEvent) {
        self.live -= 1;
        self.events.push(event);
    }
}

/// Hands out fake processes and tracks how many are alive at once.
#[derive(Debug, Clone, Default)]
pub struct FakeProcessBackend {
    state: Arc<Mutex<ProcState>>,
}

impl FakeProcessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every further `spawn` fail.
    pub fn refuse_spawn(&self, refuse: bool) {
        self.state.lock().unwrap().refuse_spawn = refuse;
    }

    /// Make every further `terminate` fail, leaving the process alive.
    pub fn refuse_terminate(&self, refuse: bool) {
        self.state.lock().unwrap().refuse_terminate = refuse;
    }

    pub fn live(&self) -> usize {
        self.state.lock().unwrap().live
    }

    /// Highest number of simultaneously alive processes ever seen.
    pub fn max_live(&self) -> usize {
        self.state.lock().unwrap().max_live
    }

    pub fn spawned(&self) -> usize {
        self.state.lock().unwrap().launches.len()
    }

    /// Program and arguments of every launch.
    pub fn launches(&self) -> Vec<(PathBuf, Vec<String>)> {
        self.state.lock().unwrap().launches.clone()
    }

    pub fn events(&self) -> Vec<ProcEvent> {
        self.state.lock().unwrap().events.clone()
    }

    /// Make process `pid` exit on its own with `outcome`.
    pub fn exit(&self, pid: u32, outcome: ExitOutcome) {
        if let Some(tx) = self.state.lock().unwrap().exits.remove(&pid) {
            let _ = tx.send(outcome);
        }
    }
}

impl ProcessBackend for FakeProcessBackend {
    fn spawn(
        &mut self,
        program: &Path,
        args: &[String],
    ) -> anyhow::Result<Box<dyn SupervisedProcess>> {
        let mut state = self.state.lock().unwrap();
        if state.refuse_spawn {
            return Err(anyhow!("exec format error: {:?}", program));
        }

        state.next_pid += 1;
        let pid = state.next_pid;
        let (tx, rx) = oneshot::channel();
        state.exits.insert(pid, tx);
        state.launches.push((program.to_path_buf(), args.to_vec()));
        state.events.push(ProcEvent::Spawned(pid));
        state.live += 1;
        state.max_live = state.max_live.max(state.live);

        Ok(Box::new(FakeProcess {
            pid,
            alive: true,
            exit: rx,
            state: Arc::clone(&self.state),
        }))
    }
}

struct FakeProcess {
    pid: u32,
    alive: bool,
    exit: oneshot::Receiver<ExitOutcome>,
    state: Arc<Mutex<ProcState>>,
}

impl SupervisedProcess for FakeProcess {
    fn id(&self) -> Option<u32> {
        self.alive.then_some(self.pid)
    }

    fn wait(&mut self) -> BoxFuture<'_, anyhow::Result<ExitOutcome>> {
        Box::pin(async move {
            if !self.alive {
                return Err(anyhow!("process {} already reaped", self.pid));
            }
            // `&mut oneshot::Receiver` is cancel safe.
            match (&mut self.exit).await {
                Ok(outcome) => {
                    self.alive = false;
                    self.state.lock().unwrap().died(ProcEvent::Exited(self.pid));
                    Ok(outcome)
                }
                Err(_) => future::pending().await,
            }
        })
    }

    fn terminate(&mut self, _grace: Duration) -> BoxFuture<'_, anyhow::Result<()>> {
        Box::pin(async move {
            if self.alive {
                let mut state = self.state.lock().unwrap();
                if state.refuse_terminate {
                    state.events.push(ProcEvent::StopFailed(self.pid));
                    return Err(anyhow!("process {} ignored the stop request", self.pid));
                }
                self.alive = false;
                state.exits.remove(&self.pid);
                state.died(ProcEvent::Terminated(self.pid));
            }
            Ok(())
        })
    }
}

impl Drop for FakeProcess {
    fn drop(&mut self) {
        if self.alive {
            if let Ok(mut state) = self.state.lock() {
                state.exits.remove(&self.pid);
                state.died(ProcEvent::Dropped(self.pid));
            }
        }
    }
}
