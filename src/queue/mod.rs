//! Admission path between submitters and the worker pool.
//!
//! Two shapes, picked at pool startup:
//!
//! - **Bounded** — a semaphore with one permit per worker gates admission, and
//!   admitted jobs flow through an unbounded channel to the worker loops. A
//!   job keeps its permit until it finishes executing, so queued plus
//!   in-flight work never exceeds the worker count. `Semaphore` hands out
//!   permits in FIFO order, which preserves per-submitter admission order.
//! - **Immediate** — no queue stage at all; every admission spawns its task
//!   straight onto the pool's task tracker.
//!
//! Closing the admission path (at shutdown) drops the sender / tracker handle
//! so workers drain what is already queued and then exit.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tokio_util::task::TaskTracker;

use crate::task::{Task, run_contained};

/// A task that has passed admission, carrying the capacity slot it occupies.
///
/// The permit is released when the job is dropped, i.e. after the worker has
/// finished running the task — not when it is dequeued.
pub(crate) struct Admitted {
    task: Task,
    _permit: OwnedSemaphorePermit,
}

impl Admitted {
    /// Executes the task, then releases the capacity slot.
    pub(crate) async fn run(self) {
        run_contained(self.task).await;
        // self._permit drops here, freeing the slot for the next admission
    }
}

/// Why an admission attempt was refused.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum AdmitError {
    /// Non-blocking admission found no free slot.
    WouldBlock,
    /// The admission path has been closed by pool shutdown.
    Closed,
}

/// Shared admission handle; producers hold this behind an [`Arc`].
pub(crate) enum Admission {
    Queued {
        tx: Mutex<Option<UnboundedSender<Admitted>>>,
        slots: Arc<Semaphore>,
    },
    Immediate {
        tracker: Mutex<Option<TaskTracker>>,
    },
}

impl Admission {
    /// Builds a bounded admission path with `max_workers` slots, returning the
    /// receiver end the worker loops will consume from.
    pub(crate) fn bounded(max_workers: usize) -> (Self, UnboundedReceiver<Admitted>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let admission = Self::Queued {
            tx: Mutex::new(Some(tx)),
            slots: Arc::new(Semaphore::new(max_workers)),
        };
        (admission, rx)
    }

    /// Builds an unbounded admission path that spawns onto `tracker`.
    pub(crate) fn immediate(tracker: TaskTracker) -> Self {
        return Self::Immediate {
            tracker: Mutex::new(Some(tracker)),
        };
    }

    /// Admits `task`, suspending while all slots are occupied.
    pub(crate) async fn admit(&self, task: Task) -> Result<(), AdmitError> {
        match self {
            Self::Queued { tx, slots } => {
                let permit = Arc::clone(slots)
                    .acquire_owned()
                    .await
                    .map_err(|_| AdmitError::Closed)?;
                let sender = tx
                    .lock()
                    .expect("admission sender lock poisoned")
                    .clone()
                    .ok_or(AdmitError::Closed)?;
                sender
                    .send(Admitted {
                        task,
                        _permit: permit,
                    })
                    .map_err(|_| AdmitError::Closed)
            }
            Self::Immediate { .. } => self.spawn(task),
        }
    }

    /// Admits `task` only if a slot is free right now.
    pub(crate) fn try_admit(&self, task: Task) -> Result<(), AdmitError> {
        match self {
            Self::Queued { tx, slots } => {
                let sender = tx
                    .lock()
                    .expect("admission sender lock poisoned")
                    .clone()
                    .ok_or(AdmitError::Closed)?;
                let permit = Arc::clone(slots)
                    .try_acquire_owned()
                    .map_err(|e| match e {
                        TryAcquireError::NoPermits => AdmitError::WouldBlock,
                        TryAcquireError::Closed => AdmitError::Closed,
                    })?;
                sender
                    .send(Admitted {
                        task,
                        _permit: permit,
                    })
                    .map_err(|_| AdmitError::Closed)
            }
            Self::Immediate { .. } => self.spawn(task),
        }
    }

    /// Closes the admission path; subsequent attempts fail with [`AdmitError::Closed`].
    pub(crate) fn close(&self) {
        match self {
            Self::Queued { tx, .. } => {
                tx.lock().expect("admission sender lock poisoned").take();
            }
            Self::Immediate { tracker } => {
                tracker.lock().expect("task tracker lock poisoned").take();
            }
        }
    }

    fn spawn(&self, task: Task) -> Result<(), AdmitError> {
        let Self::Immediate { tracker } = self else {
            unreachable!("spawn is only reachable in immediate mode");
        };
        let guard = tracker.lock().expect("task tracker lock poisoned");
        match guard.as_ref() {
            Some(tracker) => {
                let _ = tracker.spawn(run_contained(task));
                Ok(())
            }
            None => Err(AdmitError::Closed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    fn noop_task() -> Task {
        Task::new(async {})
    }

    // ── Bounded admission ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn bounded_try_admit_fills_slots_then_would_blocks() {
        let (admission, mut rx) = Admission::bounded(2);

        assert!(admission.try_admit(noop_task()).is_ok());
        assert!(admission.try_admit(noop_task()).is_ok());
        assert_eq!(
            admission.try_admit(noop_task()).unwrap_err(),
            AdmitError::WouldBlock
        );

        // Dequeuing alone does not free a slot; dropping the job does.
        let job = rx.recv().await.unwrap();
        assert_eq!(
            admission.try_admit(noop_task()).unwrap_err(),
            AdmitError::WouldBlock
        );
        drop(job);
        assert!(admission.try_admit(noop_task()).is_ok());
    }

    #[tokio::test]
    async fn bounded_admit_suspends_at_capacity() {
        let (admission, mut rx) = Admission::bounded(1);
        admission.try_admit(noop_task()).unwrap();
        let _held = rx.recv().await.unwrap();

        // The slot is still occupied, so a blocking admit must not complete.
        let waited = timeout(Duration::from_millis(50), admission.admit(noop_task())).await;
        assert!(waited.is_err(), "admit should suspend while at capacity");
    }

    #[tokio::test]
    async fn bounded_admit_resumes_when_slot_frees() {
        let (admission, mut rx) = Admission::bounded(1);
        admission.try_admit(noop_task()).unwrap();
        let held = rx.recv().await.unwrap();

        let admission = Arc::new(admission);
        let pending = {
            let admission = Arc::clone(&admission);
            tokio::spawn(async move { admission.admit(noop_task()).await })
        };

        drop(held);
        let result = timeout(Duration::from_secs(1), pending)
            .await
            .expect("admit should resume once the slot frees")
            .unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn bounded_closed_path_rejects_admission() {
        let (admission, _rx) = Admission::bounded(4);
        admission.close();

        assert_eq!(
            admission.try_admit(noop_task()).unwrap_err(),
            AdmitError::Closed
        );
        assert_eq!(
            admission.admit(noop_task()).await.unwrap_err(),
            AdmitError::Closed
        );
    }

    // ── Immediate admission ───────────────────────────────────────────────────

    #[tokio::test]
    async fn immediate_never_would_blocks() {
        let tracker = TaskTracker::new();
        let admission = Admission::immediate(tracker.clone());

        for _ in 0..64 {
            assert!(admission.try_admit(noop_task()).is_ok());
        }

        tracker.close();
        tracker.wait().await;
    }

    #[tokio::test]
    async fn immediate_closed_path_rejects_admission() {
        let tracker = TaskTracker::new();
        let admission = Admission::immediate(tracker.clone());
        admission.close();

        assert_eq!(
            admission.try_admit(noop_task()).unwrap_err(),
            AdmitError::Closed
        );
        assert_eq!(
            admission.admit(noop_task()).await.unwrap_err(),
            AdmitError::Closed
        );
    }
}
