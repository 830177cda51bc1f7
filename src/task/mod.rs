//! Deferred units of work and the execution wrapper that contains their failures.
//!
//! A [`Task`] is a boxed future with no output: callers capture whatever
//! arguments they need in an async block or closure before handing it over.
//! Tasks are executed through [`run_contained`], which guarantees that a
//! panicking task is logged and swallowed rather than tearing down the worker
//! that ran it.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;

use futures::FutureExt;
use tracing::error;

/// A zero-argument unit of deferred work.
///
/// Produces no value; it signals completion only by returning or panicking.
/// Tasks have no identity beyond the future they wrap — they are never
/// compared or deduplicated.
pub struct Task {
    future: Pin<Box<dyn Future<Output = ()> + Send + 'static>>,
}

impl Task {
    /// Wraps a future as a background task.
    pub fn new<F>(future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        return Self {
            future: Box::pin(future),
        };
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Task")
    }
}

/// Runs one task to completion, containing any panic it raises.
///
/// A panic is caught, reported through `tracing` with the panic payload when
/// one is available, and then dropped. It never reaches the worker loop, the
/// pool, or the caller that submitted the task — background failures must be
/// observable but must never affect anything else.
pub(crate) async fn run_contained(task: Task) {
    if let Err(payload) = AssertUnwindSafe(task.future).catch_unwind().await {
        error!(panic = panic_message(payload.as_ref()), "background task failed");
    }
}

/// Best-effort extraction of a panic payload's message.
fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "<non-string panic payload>"
    }
}
