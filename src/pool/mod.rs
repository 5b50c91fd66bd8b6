//! Thread-pool executors built on the queues in [`crate::queue`].
//!
//! - [`FixedThreadPool`] — a permanent, fixed-size worker set.
//! - [`CachedThreadPool`] — an elastic worker set that grows on demand and
//!   retires idle workers.
//!
//! Both accept an opaque, nullary job (`FnOnce() + Send + 'static`) and
//! never surface a return value or a future: submission is fire-and-forget,
//! and a job that panics is contained and logged, never propagated to the
//! submitter or to any other job.

mod cached;
mod fixed;

pub use cached::{make_cached_pool, CachedThreadPool};
pub use fixed::{make_fixed_pool, FixedThreadPool};

use std::panic::AssertUnwindSafe;

use tracing::warn;

/// The unit of work every pool executes: an opaque, one-shot side effect.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runs `job`, catching and logging any panic so a misbehaving job cannot
/// take down the worker thread running it or be observed by the submitter.
pub(crate) fn run_job(job: Job) {
    if let Err(payload) = std::panic::catch_unwind(AssertUnwindSafe(job)) {
        let message: &str = payload
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
            .unwrap_or("<non-string panic payload>");
        warn!(panic = message, "job panicked; swallowed by worker");
    }
}
