//! Error types for the concurrency primitives in this crate.
//!
//! Queue and pool operations never raise for expected concurrency conditions
//! (timeouts, a queue not yet ready, submission after shutdown) — those are
//! reported through sentinel returns (`bool`/`Option`). This module covers
//! only the small set of true contract violations: illegal construction
//! arguments and delay-queue deadline overflow.

use thiserror::Error;

/// Errors raised for contract violations that are not ordinary concurrency
/// outcomes.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ConcurrencyError {
    /// A fixed thread pool was requested with zero workers.
    #[error("fixed thread pool requires at least one worker")]
    ZeroWorkers,
    /// Adding a relative delay to the current instant overflowed.
    #[error("delay queue element exceeded the maximum representable deadline")]
    DelayOverflow,
}
