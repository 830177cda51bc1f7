//! The worker pool — a fixed or unbounded set of executors consuming admitted
//! background tasks, plus the lifecycle state machine that governs it.
//!
//! One pool lives for the whole host process: started once when the host
//! runtime comes up, shut down once when it goes down. Shutdown drains —
//! every task admitted before the shutdown signal runs to completion before
//! [`WorkerPool::shutdown`] returns.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

use crate::queue::{Admission, Admitted};
use crate::scheduler::BackgroundTasks;

/// Default worker count when none is configured.
pub const DEFAULT_MAX_WORKERS: usize = 1024;

/// Errors raised while constructing a pool.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("max_workers must be at least 1 (use None for an unbounded pool)")]
    InvalidMaxWorkers,
}

/// Errors raised by lifecycle transitions invoked out of order.
///
/// These indicate an integration bug in the host, not a runtime condition —
/// they are never retried and never raised by a task's own failure.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("worker pool was already started; a pool instance starts at most once")]
    AlreadyStarted,

    #[error("worker pool has not been started")]
    NotStarted,

    #[error("worker pool has been shut down")]
    Stopped,
}

/// Sizing configuration for a [`WorkerPool`].
///
/// `max_workers` is the number of concurrent executors and, at the same time,
/// the admission budget: queued plus in-flight tasks never exceed it. `None`
/// disables the bound entirely — every submission is dispatched to its own
/// concurrent execution immediately.
///
/// Deserializes from host configuration; an absent field means the default
/// bound of [`DEFAULT_MAX_WORKERS`], an explicit `null` means unbounded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    #[serde(default = "default_max_workers")]
    pub max_workers: Option<usize>,
}

fn default_max_workers() -> Option<usize> {
    Some(DEFAULT_MAX_WORKERS)
}

impl Default for PoolConfig {
    fn default() -> Self {
        return Self {
            max_workers: default_max_workers(),
        };
    }
}

impl PoolConfig {
    /// A pool bounded to `max_workers` concurrent executors.
    pub fn bounded(max_workers: usize) -> Self {
        Self {
            max_workers: Some(max_workers),
        }
    }

    /// A pool with no concurrency bound.
    pub fn unbounded() -> Self {
        Self { max_workers: None }
    }
}

/// Observable lifecycle state of a [`WorkerPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    NotStarted,
    Running,
    Draining,
    Stopped,
}

/// Internal state; `Running` owns the handles the other states have no use for.
enum State {
    NotStarted,
    Running {
        admission: Arc<Admission>,
        tracker: TaskTracker,
    },
    Draining,
    Stopped,
}

/// A pool of concurrent background-task executors.
///
/// Created once per host process, started by the host's startup signal and
/// shut down (with drain) by its shutdown signal. Submission handles are
/// handed out per unit of work via [`WorkerPool::scheduler`].
///
/// # Examples
///
/// ```rust,no_run
/// use afterwork::{PoolConfig, WorkerPool};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = WorkerPool::new(PoolConfig::bounded(8))?;
/// pool.start()?;
///
/// let tasks = pool.scheduler()?;
/// tasks.submit(async { /* deferred work */ }).await?;
///
/// pool.shutdown().await?; // waits for the task above to finish
/// # Ok(())
/// # }
/// ```
pub struct WorkerPool {
    max_workers: Option<usize>,
    state: Mutex<State>,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("max_workers", &self.max_workers)
            .finish_non_exhaustive()
    }
}

impl WorkerPool {
    /// Creates a pool from `config` without starting it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidMaxWorkers`] when `max_workers` is
    /// `Some(0)`; a pool needs at least one executor unless the bound is
    /// disabled with `None`.
    pub fn new(config: PoolConfig) -> Result<Self, ConfigError> {
        if config.max_workers == Some(0) {
            return Err(ConfigError::InvalidMaxWorkers);
        }
        Ok(Self {
            max_workers: config.max_workers,
            state: Mutex::new(State::NotStarted),
        })
    }

    /// Transitions `NotStarted → Running`, spawning the worker loops.
    ///
    /// Must be called from within a tokio runtime. Intended to be driven by
    /// the host runtime's startup signal, exactly once per pool instance.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::AlreadyStarted`] if the pool is or ever was
    /// running — a stopped pool cannot be restarted.
    pub fn start(&self) -> Result<(), LifecycleError> {
        let mut state = self.state.lock().expect("pool state lock poisoned");
        if !matches!(*state, State::NotStarted) {
            return Err(LifecycleError::AlreadyStarted);
        }

        let tracker = TaskTracker::new();
        let admission = match self.max_workers {
            Some(workers) => {
                let (admission, rx) = Admission::bounded(workers);
                spawn_workers(workers, rx, &tracker);
                info!(workers, "worker pool started");
                admission
            }
            None => {
                info!("worker pool started (unbounded)");
                Admission::immediate(tracker.clone())
            }
        };

        *state = State::Running {
            admission: Arc::new(admission),
            tracker,
        };
        Ok(())
    }

    /// Transitions `Running → Draining → Stopped`.
    ///
    /// Closes the admission path, then waits for every already-admitted task
    /// (and, in unbounded mode, every dispatched task) to finish. Intended to
    /// be driven by the host runtime's shutdown signal; the host's shutdown
    /// must not complete before this returns.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::NotStarted`] when the pool was never started,
    /// or [`LifecycleError::Stopped`] when shutdown already ran.
    pub async fn shutdown(&self) -> Result<(), LifecycleError> {
        let (admission, tracker) = {
            let mut state = self.state.lock().expect("pool state lock poisoned");
            match std::mem::replace(&mut *state, State::Draining) {
                State::Running { admission, tracker } => (admission, tracker),
                State::NotStarted => {
                    *state = State::NotStarted;
                    return Err(LifecycleError::NotStarted);
                }
                // A concurrent shutdown is still draining; leave its state alone.
                State::Draining => {
                    *state = State::Draining;
                    return Err(LifecycleError::Stopped);
                }
                State::Stopped => {
                    *state = State::Stopped;
                    return Err(LifecycleError::Stopped);
                }
            }
        };

        debug!("worker pool draining");
        admission.close();
        tracker.close();
        tracker.wait().await;

        *self.state.lock().expect("pool state lock poisoned") = State::Stopped;
        info!("worker pool stopped");
        Ok(())
    }

    /// Hands out a submission handle bound to this pool's admission path.
    ///
    /// One handle is created per unit of work; the handle stays cheap to
    /// clone and holds no mutable state of its own.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::NotStarted`] or [`LifecycleError::Stopped`]
    /// when the pool is not currently running.
    pub fn scheduler(&self) -> Result<BackgroundTasks, LifecycleError> {
        let state = self.state.lock().expect("pool state lock poisoned");
        match &*state {
            State::Running { admission, .. } => Ok(BackgroundTasks::new(Arc::clone(admission))),
            State::NotStarted => Err(LifecycleError::NotStarted),
            State::Draining | State::Stopped => Err(LifecycleError::Stopped),
        }
    }

    /// The pool's current lifecycle state.
    pub fn state(&self) -> PoolState {
        match &*self.state.lock().expect("pool state lock poisoned") {
            State::NotStarted => PoolState::NotStarted,
            State::Running { .. } => PoolState::Running,
            State::Draining => PoolState::Draining,
            State::Stopped => PoolState::Stopped,
        }
    }
}

/// Spawns `workers` loops sharing one receiver.
///
/// The receiver sits behind an async mutex: one idle worker at a time parks
/// in `recv`, releases the lock as soon as it has a job, and runs the job
/// outside the critical section so the other workers can pull concurrently.
fn spawn_workers(workers: usize, rx: UnboundedReceiver<Admitted>, tracker: &TaskTracker) {
    let rx = Arc::new(tokio::sync::Mutex::new(rx));
    for _ in 0..workers {
        let _ = tracker.spawn(worker_loop(Arc::clone(&rx)));
    }
}

/// One executor: pull a job, run it (failure contained), repeat until the
/// admission path closes and the queue is empty.
async fn worker_loop(rx: Arc<tokio::sync::Mutex<UnboundedReceiver<Admitted>>>) {
    loop {
        let job = { rx.lock().await.recv().await };
        match job {
            Some(job) => job.run().await,
            None => break,
        }
    }
}
