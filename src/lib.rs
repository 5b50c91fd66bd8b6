//! # Prometheus Parking Lot
//!
//! Concurrency primitives for in-process parallel work: a family of
//! blocking queues and two thread-pool executors built on top of them.
//!
//! ## Queues
//!
//! Three realizations share the six-operation contract in
//! [`queue::BlockingQueue`] (`offer`/`offer_timeout`/`put`/`poll`/
//! `poll_timeout`/`take`):
//!
//! - [`queue::BufferedQueue`] — a fixed-capacity FIFO.
//! - [`queue::RendezvousQueue`] — a zero-capacity synchronous handoff.
//! - [`queue::DelayQueue`] — a deadline-ordered priority queue (a cousin of
//!   the contract, since insertion can fail on deadline overflow).
//!
//! ## Pools
//!
//! - [`pool::FixedThreadPool`] — N permanent workers, graceful and
//!   immediate shutdown.
//! - [`pool::CachedThreadPool`] — an elastic worker set that grows on
//!   demand and retires idle workers.
//!
//! Jobs submitted to either pool are opaque, nullary, fire-and-forget
//! effects: there is no return-value or future surface, and a panicking job
//! is caught and logged rather than propagated.
//!
//! ## Quick example
//!
//! ```
//! use prometheus_parking_lot::pool::FixedThreadPool;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! let pool = FixedThreadPool::new(4).unwrap();
//! let counter = Arc::new(AtomicUsize::new(0));
//!
//! for _ in 0..10 {
//!     let counter = Arc::clone(&counter);
//!     pool.submit(move || {
//!         counter.fetch_add(1, Ordering::SeqCst);
//!     });
//! }
//!
//! pool.shutdown(true);
//! assert_eq!(counter.load(Ordering::SeqCst), 10);
//! ```

#![deny(warnings)]
#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Mutual exclusion, built on `parking_lot::Mutex`.
mod mutex;
/// Condition variable, built on `parking_lot::Condvar`.
mod condvar;
/// Crate-wide error types for contract violations (not ordinary
/// concurrency outcomes, which use sentinel returns instead).
pub mod error;
/// The scoped lock-with-hooks primitive underlying the rendezvous queue.
pub mod lock;
/// Blocking queue realizations: buffered, rendezvous, and delay.
pub mod queue;
/// Thread-pool executors built on the queues above.
pub mod pool;
/// Shared utilities (structured logging setup).
pub mod util;

pub use condvar::{Condvar, WaitTimeoutResult};
pub use error::ConcurrencyError;
pub use lock::{HookedGuard, HookedLock};
pub use mutex::{MappedMutexGuard, Mutex, MutexGuard};
pub use pool::{make_cached_pool, make_fixed_pool, CachedThreadPool, FixedThreadPool};
pub use queue::{BlockingQueue, BufferedQueue, DelayQueue, Delayed, RendezvousQueue};

