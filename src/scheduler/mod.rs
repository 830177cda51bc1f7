//! Per-unit-of-work submission facade.
//!
//! A [`BackgroundTasks`] handle is handed out for each unit of host work
//! (one inbound request, typically) and exposes the two submission paths:
//! blocking [`submit`](BackgroundTasks::submit) and non-blocking
//! [`submit_no_wait`](BackgroundTasks::submit_no_wait). The handle is cheap
//! to clone and holds no state beyond a reference to the shared pool's
//! admission path and the seal tied to its unit of work.
//!
//! Once the unit of work ends its handle is sealed: further submissions fail
//! with [`ScheduleError::UnitFinished`], while tasks already admitted keep
//! running under the pool's own lifetime.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;

use crate::queue::{Admission, AdmitError};
use crate::task::Task;

/// Errors surfaced to submitters.
///
/// Note the asymmetry with task failures: a failure *inside* a background
/// task never crosses this boundary — it is contained and logged by the pool.
#[derive(Debug, Error)]
pub enum ScheduleError {
    /// Non-blocking submission found no free execution slot. Recoverable:
    /// retry later, drop the task, or fall back to the blocking path.
    #[error("no background worker is available to accept the task")]
    WouldBlock,

    /// The owning unit of work already finished; its handle no longer
    /// accepts submissions.
    #[error("unit of work has ended; background tasks can no longer be submitted through it")]
    UnitFinished,

    /// The pool behind this handle has been shut down.
    #[error("worker pool has been shut down")]
    PoolStopped,
}

impl From<AdmitError> for ScheduleError {
    fn from(err: AdmitError) -> Self {
        match err {
            AdmitError::WouldBlock => Self::WouldBlock,
            AdmitError::Closed => Self::PoolStopped,
        }
    }
}

/// Submission handle for one unit of work.
///
/// # Examples
///
/// ```rust,no_run
/// use afterwork::{BackgroundTasks, ScheduleError};
///
/// # async fn example(tasks: &BackgroundTasks) -> Result<(), ScheduleError> {
/// // Wait for a slot if the pool is saturated:
/// tasks.submit(async { /* send an email, update a cache, ... */ }).await?;
///
/// // Or refuse to wait:
/// match tasks.submit_no_wait(async { /* best-effort work */ }) {
///     Ok(()) => {}
///     Err(ScheduleError::WouldBlock) => { /* shed the task */ }
///     Err(other) => return Err(other),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct BackgroundTasks {
    admission: Arc<Admission>,
    sealed: Arc<AtomicBool>,
}

impl std::fmt::Debug for BackgroundTasks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundTasks")
            .field("sealed", &self.sealed.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl BackgroundTasks {
    pub(crate) fn new(admission: Arc<Admission>) -> Self {
        return Self {
            admission,
            sealed: Arc::new(AtomicBool::new(false)),
        };
    }

    /// Marks the owning unit of work as finished. All clones of the handle
    /// observe the seal; in-flight tasks are unaffected.
    pub(crate) fn seal(&self) {
        self.sealed.store(true, Ordering::SeqCst);
    }

    /// Submits a task, suspending until the pool accepts it.
    ///
    /// Never fails due to capacity — saturation only makes the call wait.
    /// Returns as soon as the task is admitted; it does not wait for the
    /// task to run.
    ///
    /// # Errors
    ///
    /// - [`ScheduleError::UnitFinished`] if the owning unit of work ended.
    /// - [`ScheduleError::PoolStopped`] if the pool shut down.
    pub async fn submit<F>(&self, task: F) -> Result<(), ScheduleError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.ensure_open()?;
        self.admission.admit(Task::new(task)).await?;
        Ok(())
    }

    /// Submits a task only if an execution slot is free right now.
    ///
    /// Never suspends the caller.
    ///
    /// # Errors
    ///
    /// - [`ScheduleError::WouldBlock`] if every slot is occupied (bounded
    ///   pools only; unbounded pools always accept).
    /// - [`ScheduleError::UnitFinished`] if the owning unit of work ended.
    /// - [`ScheduleError::PoolStopped`] if the pool shut down.
    pub fn submit_no_wait<F>(&self, task: F) -> Result<(), ScheduleError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.ensure_open()?;
        self.admission.try_admit(Task::new(task))?;
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), ScheduleError> {
        if self.sealed.load(Ordering::SeqCst) {
            return Err(ScheduleError::UnitFinished);
        }
        Ok(())
    }
}
