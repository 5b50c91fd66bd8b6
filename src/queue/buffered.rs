//! A fixed-capacity FIFO blocking queue.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::queue::{wait_until_deadline, BlockingQueue};
use crate::{Condvar, Mutex};

struct Buffer<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> Buffer<T> {
    fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// A blocking FIFO queue with a fixed, positive capacity.
///
/// Producers blocked in `put`/timed `offer` wait on a "not full" condition;
/// consumers blocked in `take`/timed `poll` wait on a "not empty" condition.
/// Both sides recheck their predicate after every wake and notify the
/// opposite side only after releasing the internal mutex.
pub struct BufferedQueue<T> {
    buffer: Mutex<Buffer<T>>,
    not_full: Condvar,
    not_empty: Condvar,
}

impl<T> BufferedQueue<T> {
    /// Creates a queue that holds at most `capacity` elements at once.
    ///
    /// # Panics
    ///
    /// Panics if `capacity == 0` — a queue that can never hold an element is
    /// a caller bug, not a runtime condition to recover from.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "BufferedQueue capacity must be greater than zero");
        Self {
            buffer: Mutex::new(Buffer {
                items: VecDeque::with_capacity(capacity),
                capacity,
            }),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
        }
    }

    /// The configured capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buffer.lock().capacity
    }

    /// The number of elements currently buffered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.lock().items.len()
    }

    /// Whether the queue currently holds no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn deadline_for(timeout: Duration) -> Instant {
        Instant::now().checked_add(timeout).unwrap_or(Instant::now())
    }
}

impl<T> BlockingQueue<T> for BufferedQueue<T> {
    fn offer_timeout(&self, item: T, timeout: Duration) -> bool {
        let deadline = Self::deadline_for(timeout);
        let mut guard = self.buffer.lock();
        if !wait_until_deadline(&self.not_full, &mut guard, Some(deadline), |b| !b.is_full()) {
            return false;
        }
        guard.items.push_back(item);
        drop(guard);
        self.not_empty.notify_one();
        true
    }

    fn put(&self, item: T) {
        let mut guard = self.buffer.lock();
        wait_until_deadline(&self.not_full, &mut guard, None, |b| !b.is_full());
        guard.items.push_back(item);
        drop(guard);
        self.not_empty.notify_one();
    }

    fn poll_timeout(&self, timeout: Duration) -> Option<T> {
        let deadline = Self::deadline_for(timeout);
        let mut guard = self.buffer.lock();
        if !wait_until_deadline(&self.not_empty, &mut guard, Some(deadline), |b| !b.is_empty()) {
            return None;
        }
        let item = guard.items.pop_front().expect("not-empty predicate just held");
        drop(guard);
        self.not_full.notify_one();
        Some(item)
    }

    fn take(&self) -> T {
        let mut guard = self.buffer.lock();
        wait_until_deadline(&self.not_empty, &mut guard, None, |b| !b.is_empty());
        let item = guard.items.pop_front().expect("not-empty predicate just held");
        drop(guard);
        self.not_full.notify_one();
        item
    }
}
