//! A zero-capacity synchronous handoff queue.

use std::time::{Duration, Instant};

use crate::lock::HookedLock;
use crate::queue::{wait_until_deadline, BlockingQueue};
use crate::{Condvar, Mutex};

struct State<T> {
    /// Holds at most one value while a handoff is in progress.
    slot: Option<T>,
    /// Threads currently inside the insertion path (offer/put), including
    /// ones that fail or succeed immediately without ever blocking.
    producers_waiting: u32,
    /// Threads currently inside the removal path (poll/take), including
    /// ones that fail or succeed immediately without ever blocking.
    consumers_waiting: u32,
}

impl<T> State<T> {
    fn accepts_producer(&self) -> bool {
        self.consumers_waiting > 0 && self.slot.is_none()
    }

    fn has_value_for_consumer(&self) -> bool {
        self.slot.is_some()
    }
}

/// A queue with no internal storage: a producer's `offer`/`put` only
/// succeeds once a consumer is already present in `take`/`poll`, and vice
/// versa.
///
/// Waiter counts (`producers_waiting`, `consumers_waiting`) are updated
/// through [`HookedLock`] so that every thread entering the insertion or
/// removal path is counted — even one that fails or succeeds without ever
/// blocking — and so the counter is never observed out of step with the
/// critical section it describes. A producer is admitted only when a
/// consumer is present *and* the single handoff slot is empty, which keeps
/// exactly one value in flight at a time.
pub struct RendezvousQueue<T> {
    state: Mutex<State<T>>,
    not_full: Condvar,
    not_empty: Condvar,
}

impl<T> Default for RendezvousQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> RendezvousQueue<T> {
    /// Creates an empty rendezvous queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                slot: None,
                producers_waiting: 0,
                consumers_waiting: 0,
            }),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
        }
    }

    fn deadline_for(timeout: Duration) -> Instant {
        Instant::now().checked_add(timeout).unwrap_or(Instant::now())
    }

    fn offer_core(&self, item: T, deadline: Option<Instant>) -> Result<(), T> {
        let mut guard = HookedLock::acquire(
            &self.state,
            |s| s.producers_waiting += 1,
            |s| s.producers_waiting -= 1,
        );
        if !wait_until_deadline(&self.not_full, guard.guard_mut(), deadline, |s| s.accepts_producer()) {
            return Err(item);
        }
        guard.slot = Some(item);
        drop(guard);
        self.not_empty.notify_one();
        Ok(())
    }

    fn poll_core(&self, deadline: Option<Instant>) -> Option<T> {
        let mut guard = HookedLock::acquire(
            &self.state,
            |s| s.consumers_waiting += 1,
            |s| s.consumers_waiting -= 1,
        );
        // A consumer's arrival can be exactly what a producer blocked in
        // `put`/timed `offer` is waiting for (`accepts_producer` depends on
        // `consumers_waiting`), so wake one before waiting ourselves.
        self.not_full.notify_one();
        if !wait_until_deadline(&self.not_empty, guard.guard_mut(), deadline, |s| s.has_value_for_consumer()) {
            return None;
        }
        let item = guard.slot.take().expect("not-empty predicate just held");
        drop(guard);
        self.not_full.notify_one();
        Some(item)
    }

    /// Attempts an immediate, non-blocking handoff, returning the item back
    /// to the caller if no consumer is currently waiting.
    ///
    /// This differs from [`BlockingQueue::offer`] only in that a failed
    /// attempt gives the item back instead of dropping it — useful for a
    /// caller (such as [`crate::pool::CachedThreadPool`]) that needs to fall
    /// back to a different strategy with the same value.
    pub fn try_offer(&self, item: T) -> Result<(), T> {
        self.offer_core(item, Some(Instant::now()))
    }
}

impl<T> BlockingQueue<T> for RendezvousQueue<T> {
    fn offer_timeout(&self, item: T, timeout: Duration) -> bool {
        self.offer_core(item, Some(Self::deadline_for(timeout))).is_ok()
    }

    fn put(&self, item: T) {
        let _ = self.offer_core(item, None);
    }

    fn poll_timeout(&self, timeout: Duration) -> Option<T> {
        self.poll_core(Some(Self::deadline_for(timeout)))
    }

    fn take(&self) -> T {
        self.poll_core(None).expect("unbounded wait always yields a value")
    }
}
