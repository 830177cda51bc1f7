//! Binds the worker pool to the host runtime's lifecycle.
//!
//! The host calls [`Lifecycle::startup`] once when it comes up and
//! [`Lifecycle::shutdown`] once when it goes down; between the two it asks
//! for one [`Context`] per unit of work. Shutdown does not complete until
//! every admitted task has drained, so a host that awaits it before exiting
//! never strands background work.
//!
//! # Examples
//!
//! ```rust,no_run
//! use afterwork::{Lifecycle, PoolConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let lifecycle = Lifecycle::new(PoolConfig::default())?;
//! lifecycle.startup()?;
//!
//! // per unit of work, typically inside the host's request handler:
//! {
//!     let ctx = lifecycle.context()?;
//!     ctx.tasks().submit(async { /* deferred work */ }).await?;
//!     // ... produce and deliver the primary result ...
//! } // ctx drops: the unit is over, the task keeps running
//!
//! lifecycle.shutdown().await?; // drains before returning
//! # Ok(())
//! # }
//! ```

use crate::context::Context;
use crate::pool::{ConfigError, LifecycleError, PoolConfig, WorkerPool};

/// Couples one [`WorkerPool`] to the host runtime's startup and shutdown
/// signals and hands out per-unit contexts.
pub struct Lifecycle {
    pool: WorkerPool,
}

impl Lifecycle {
    /// Builds the coordinator and its (not yet started) pool.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for an invalid `max_workers`.
    pub fn new(config: PoolConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            pool: WorkerPool::new(config)?,
        })
    }

    /// Wraps an existing pool; useful when the host constructs the pool
    /// itself.
    pub fn from_pool(pool: WorkerPool) -> Self {
        Self { pool }
    }

    /// Host startup signal: starts the pool. Call exactly once.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::AlreadyStarted`] on a second call.
    pub fn startup(&self) -> Result<(), LifecycleError> {
        self.pool.start()
    }

    /// Host shutdown signal: drains and stops the pool. Call exactly once,
    /// after [`startup`](Self::startup), and await it before the host exits.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::NotStarted`] if startup never ran, or
    /// [`LifecycleError::Stopped`] on a second call.
    pub async fn shutdown(&self) -> Result<(), LifecycleError> {
        self.pool.shutdown().await
    }

    /// Builds the context for one unit of work, with a fresh submission
    /// handle attached.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError`] when the pool is not running.
    pub fn context(&self) -> Result<Context, LifecycleError> {
        Ok(Context::new(self.pool.scheduler()?))
    }

    /// The underlying pool, for state inspection.
    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }
}
