//! Poll scheduler: independent, fixed-delay refresh loops.
//!
//! Each registered [`PollAction`] runs in its own tokio task:
//!
//! 1. runs once immediately on registration;
//! 2. sleeps its cadence only after the current cycle settles, so a slow
//!    response delays the next cycle instead of overlapping it;
//! 3. reports failures to the [`UplinkMonitor`] and keeps going.
//!
//! Every task captures a [`Liveness`] guard at registration. Merges go through
//! [`Liveness::run_if_alive`], which holds the guard's lock while merging:
//! once [`PollScheduler::shutdown`] returns, no merge can start, even for a
//! request that was already in flight.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use agni_sync::{PollScheduler, SwarmPoll, UplinkMonitor, ViewModelStore};
//! use agni_sync::mock::ScriptedGateway;
//!
//! # async fn example() {
//! let store = Arc::new(ViewModelStore::new());
//! let gateway = Arc::new(ScriptedGateway::new());
//! let mut scheduler = PollScheduler::new(Arc::new(UplinkMonitor::default()));
//!
//! scheduler.register(SwarmPoll::new(gateway, store), Duration::from_secs(3));
//! // ...
//! scheduler.shutdown_and_wait().await;
//! # }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use agni_core::log_sync_event;
use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::health::{Source, UplinkMonitor};

/// Teardown guard shared between an owner and its in-flight work.
#[derive(Debug, Clone)]
pub struct Liveness {
    inner: Arc<LivenessInner>,
}

#[derive(Debug)]
struct LivenessInner {
    alive: Mutex<bool>,
    killed_tx: watch::Sender<bool>,
}

impl Default for Liveness {
    fn default() -> Self {
        Self::new()
    }
}

impl Liveness {
    pub fn new() -> Self {
        let (killed_tx, _) = watch::channel(false);
        Self {
            inner: Arc::new(LivenessInner {
                alive: Mutex::new(true),
                killed_tx,
            }),
        }
    }

    pub fn is_alive(&self) -> bool {
        *self.inner.alive.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` only if still alive. Teardown waits for a running `f`.
    pub fn run_if_alive<R>(&self, f: impl FnOnce() -> R) -> Option<R> {
        let alive = self.inner.alive.lock().unwrap_or_else(PoisonError::into_inner);
        if *alive { Some(f()) } else { None }
    }

    /// Mark dead and wake anything waiting in [`killed`](Self::killed).
    pub fn kill(&self) {
        *self.inner.alive.lock().unwrap_or_else(PoisonError::into_inner) = false;
        self.inner.killed_tx.send_replace(true);
    }

    /// Resolves once [`kill`](Self::kill) has been called.
    pub async fn killed(&self) {
        let mut rx = self.inner.killed_tx.subscribe();
        // The sender lives in `self`, so the channel cannot close under us.
        let _ = rx.wait_for(|killed| *killed).await;
    }
}

/// Result of one settled poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Fresh data was merged into the store
    Merged,
    /// The task was torn down while the request was in flight
    Discarded,
}

/// One fetch-and-merge cycle.
#[async_trait]
pub trait PollAction: Send + Sync + 'static {
    /// Task name for logs.
    fn name(&self) -> &'static str;

    /// Health source this task reports under.
    fn source(&self) -> Source;

    /// Fetch and merge once. Merges must go through `liveness.run_if_alive`.
    async fn run(&self, liveness: &Liveness) -> Result<PollOutcome>;
}

struct PollTask {
    name: &'static str,
    cadence: Duration,
    liveness: Liveness,
    cycles: Arc<AtomicU64>,
    handle: Option<JoinHandle<()>>,
}

/// Owner of all poll tasks; stops them as a unit.
pub struct PollScheduler {
    monitor: Arc<UplinkMonitor>,
    tasks: Vec<PollTask>,
}

impl PollScheduler {
    pub fn new(monitor: Arc<UplinkMonitor>) -> Self {
        Self {
            monitor,
            tasks: Vec::new(),
        }
    }

    /// Start `action` on a fixed-delay cadence. The first cycle runs
    /// immediately.
    ///
    /// Must be called from within a tokio runtime.
    pub fn register<A: PollAction>(&mut self, action: A, cadence: Duration) {
        let name = action.name();
        let liveness = Liveness::new();
        let cycles = Arc::new(AtomicU64::new(0));

        info!(task = name, cadence_ms = cadence.as_millis() as u64, "starting poll task");

        let handle = tokio::spawn(run_task(
            action,
            cadence,
            liveness.clone(),
            Arc::clone(&self.monitor),
            Arc::clone(&cycles),
        ));

        self.tasks.push(PollTask {
            name,
            cadence,
            liveness,
            cycles,
            handle: Some(handle),
        });
    }

    /// Names of registered tasks, in registration order.
    pub fn task_names(&self) -> Vec<&'static str> {
        self.tasks.iter().map(|t| t.name).collect()
    }

    /// Cadence of a task.
    pub fn cadence(&self, name: &str) -> Option<Duration> {
        self.tasks.iter().find(|t| t.name == name).map(|t| t.cadence)
    }

    /// Settled cycles of a task so far.
    pub fn cycles(&self, name: &str) -> u64 {
        self.tasks
            .iter()
            .find(|t| t.name == name)
            .map_or(0, |t| t.cycles.load(Ordering::SeqCst))
    }

    /// Whether any task is still alive.
    pub fn is_running(&self) -> bool {
        self.tasks.iter().any(|t| t.liveness.is_alive())
    }

    /// Stop every task. In-flight requests may still resolve, but their
    /// merges are dropped.
    pub fn shutdown(&self) {
        for task in &self.tasks {
            task.liveness.kill();
        }
        if !self.tasks.is_empty() {
            info!(tasks = self.tasks.len(), "poll scheduler shut down");
        }
    }

    /// Stop every task and wait for them to exit.
    pub async fn shutdown_and_wait(&mut self) {
        self.shutdown();
        for task in &mut self.tasks {
            if let Some(handle) = task.handle.take() {
                if let Err(e) = handle.await {
                    warn!(task = task.name, error = %e, "poll task ended abnormally");
                }
            }
        }
    }
}

impl Drop for PollScheduler {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.liveness.kill();
        }
    }
}

async fn run_task<A: PollAction>(
    action: A,
    cadence: Duration,
    liveness: Liveness,
    monitor: Arc<UplinkMonitor>,
    cycles: Arc<AtomicU64>,
) {
    let name = action.name();
    let source = action.source();

    while liveness.is_alive() {
        match action.run(&liveness).await {
            Ok(PollOutcome::Merged) => {
                monitor.record_success(source);
                log_sync_event!(source.name(), "merged", task = name);
            }
            Ok(PollOutcome::Discarded) => {
                log_sync_event!(source.name(), "discarded", task = name);
                break;
            }
            Err(e) => {
                if liveness.is_alive() {
                    monitor.record_failure(source, &e);
                }
            }
        }
        cycles.fetch_add(1, Ordering::SeqCst);

        tokio::select! {
            _ = tokio::time::sleep(cadence) => {}
            _ = liveness.killed() => break,
        }
    }

    debug!(task = name, "poll task stopped");
}
