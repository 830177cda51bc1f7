//! # afterwork
//!
//! Bounded, backpressure-aware background task scheduling for async Rust
//! services.
//!
//! Work queued during a request-like operation runs *after* the primary
//! result has been delivered, on a shared worker pool that lives for the
//! whole process. Task failures are contained and logged — they never crash
//! a worker, the pool, or the operation that submitted them.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use afterwork::{Lifecycle, PoolConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let lifecycle = Lifecycle::new(PoolConfig::bounded(64))?;
//!     lifecycle.startup()?;
//!
//!     // For each unit of work the host handles:
//!     let ctx = lifecycle.context()?;
//!     ctx.tasks().submit(async {
//!         // runs on the pool, after the primary result is delivered
//!     }).await?;
//!     drop(ctx); // unit of work ends; the task keeps running
//!
//!     lifecycle.shutdown().await?; // drains all admitted tasks
//!     Ok(())
//! }
//! ```

pub mod context;
pub mod lifecycle;
pub mod pool;
pub mod scheduler;
pub mod task;

pub(crate) mod queue;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use context::{Context, Extensions};
pub use lifecycle::Lifecycle;
pub use pool::{ConfigError, DEFAULT_MAX_WORKERS, LifecycleError, PoolConfig, PoolState, WorkerPool};
pub use scheduler::{BackgroundTasks, ScheduleError};
pub use task::Task;
