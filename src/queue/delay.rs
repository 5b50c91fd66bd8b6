//! A priority queue ordered by absolute deadline.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::time::{Duration, Instant};

use crate::error::ConcurrencyError;
use crate::{Condvar, Mutex};

/// Use [`DelayQueue`]'s overflow error directly — there is exactly one way a
/// delay queue operation can fail, so this is a thin alias rather than a
/// queue-specific enum.
pub type DelayQueueError = ConcurrencyError;

/// A value that knows how long to wait, relative to submission time, before
/// it becomes eligible for removal from a [`DelayQueue`].
pub trait Delayed {
    /// The relative delay, measured from the moment the value is submitted.
    fn delay(&self) -> Duration;
}

struct Entry<T> {
    deadline: Instant,
    seq: u64,
    value: T,
}

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl<T> Eq for Entry<T> {}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Entry<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.deadline, self.seq).cmp(&(other.deadline, other.seq))
    }
}

struct Heap<T> {
    entries: BinaryHeap<Reverse<Entry<T>>>,
    next_seq: u64,
}

impl<T> Heap<T> {
    fn head_key(&self) -> Option<(Instant, u64)> {
        self.entries.peek().map(|e| (e.0.deadline, e.0.seq))
    }
}

/// A blocking queue that delivers elements in absolute-deadline order.
///
/// Each element's deadline is fixed at submission time as
/// `now + element.delay()`; an overflowing addition is rejected rather than
/// silently saturated, since a deadline that can't be represented is a
/// contract violation, not an ordinary capacity condition. Storage is a
/// binary min-heap keyed by deadline; a consumer blocked in `take`/`poll`
/// sleeps until `min(outer_deadline, head.deadline)` and re-evaluates on
/// every wake, so a fresher, earlier-deadline insertion reschedules the wait
/// rather than leaving the waiter asleep past a deadline that has since
/// moved earlier.
///
/// Unlike [`crate::queue::BufferedQueue`] and [`crate::queue::RendezvousQueue`],
/// `DelayQueue` does not implement [`crate::queue::BlockingQueue`]: insertion
/// has a fallible outcome (deadline overflow) that the uniform trait's
/// `bool`/`()` returns cannot express.
pub struct DelayQueue<T> {
    heap: Mutex<Heap<T>>,
    deadline_changed: Condvar,
}

impl<T> Default for DelayQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Delayed> DelayQueue<T> {
    /// Creates an empty delay queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            heap: Mutex::new(Heap {
                entries: BinaryHeap::new(),
                next_seq: 0,
            }),
            deadline_changed: Condvar::new(),
        }
    }

    /// The number of elements currently held, regardless of whether their
    /// deadlines have been reached.
    #[must_use]
    pub fn len(&self) -> usize {
        self.heap.lock().entries.len()
    }

    /// Whether the queue currently holds no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Inserts `item`, computing its deadline as `now + item.delay()`.
    ///
    /// Insertion never blocks: there is no capacity limit to wait for.
    ///
    /// # Errors
    ///
    /// Returns [`ConcurrencyError::DelayOverflow`] if `now + item.delay()`
    /// cannot be represented.
    pub fn put(&self, item: T) -> Result<(), ConcurrencyError> {
        let now = Instant::now();
        let deadline = now.checked_add(item.delay()).ok_or(ConcurrencyError::DelayOverflow)?;

        let mut guard = self.heap.lock();
        let seq = guard.next_seq;
        guard.next_seq += 1;
        guard.entries.push(Reverse(Entry { deadline, seq, value: item }));
        drop(guard);

        // Every idle waiter (one per outstanding `take`/`poll`) must
        // re-evaluate its own wake-at instant against the new entry, not
        // just whichever one happens to be sleeping against the old head's
        // deadline — notifying only on a head change strands waiters behind
        // an unchanged head (see `elements_are_delivered_in_deadline_order`
        // with more than one blocked consumer).
        self.deadline_changed.notify_all();
        Ok(())
    }

    /// Equivalent to [`Self::put`]; kept for symmetry with the other queue
    /// types' `offer`. Since insertion here never blocks on capacity, the
    /// two are identical apart from name.
    ///
    /// # Errors
    ///
    /// See [`Self::put`].
    pub fn offer(&self, item: T) -> Result<(), ConcurrencyError> {
        self.put(item)
    }

    fn poll_core(&self, outer_deadline: Option<Instant>) -> Option<T> {
        let mut guard = self.heap.lock();
        loop {
            if let Some((head_deadline, _)) = guard.head_key() {
                let now = Instant::now();
                if head_deadline <= now {
                    let entry = guard.entries.pop().expect("head key implies a head element").0;
                    return Some(entry.value);
                }
                if let Some(od) = outer_deadline {
                    if now >= od {
                        return None;
                    }
                }
                let wake_at = outer_deadline.map_or(head_deadline, |od| od.min(head_deadline));
                self.deadline_changed.wait_until(&mut guard, wake_at);
            } else {
                match outer_deadline {
                    None => self.deadline_changed.wait(&mut guard),
                    Some(od) => {
                        if Instant::now() >= od {
                            return None;
                        }
                        self.deadline_changed.wait_until(&mut guard, od);
                    }
                }
            }
        }
    }

    /// Removes and returns the element with the earliest deadline if that
    /// deadline has already passed; returns `None` otherwise, without
    /// blocking.
    #[must_use]
    pub fn poll(&self) -> Option<T> {
        self.poll_core(Some(Instant::now()))
    }

    /// Removes and returns the element with the earliest deadline, waiting
    /// up to `timeout` for that deadline to be reached.
    #[must_use]
    pub fn poll_timeout(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now().checked_add(timeout).unwrap_or_else(Instant::now);
        self.poll_core(Some(deadline))
    }

    /// Removes and returns the element with the earliest deadline, blocking
    /// indefinitely until that deadline is reached.
    pub fn take(&self) -> T {
        self.poll_core(None).expect("unbounded wait always yields a value")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    struct Delay(Duration);

    impl Delayed for Delay {
        fn delay(&self) -> Duration {
            self.0
        }
    }

    #[test]
    fn poll_returns_none_before_any_deadline() {
        let queue = DelayQueue::new();
        queue.put(Delay(Duration::from_secs(10))).unwrap();
        assert_eq!(queue.poll(), None);
    }

    #[test]
    fn take_blocks_until_the_deadline_is_reached() {
        let queue: Arc<DelayQueue<Delay>> = Arc::new(DelayQueue::new());
        queue.put(Delay(Duration::from_millis(30))).unwrap();

        let started = Instant::now();
        queue.take();
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn elements_are_delivered_in_deadline_order() {
        let queue = DelayQueue::new();
        queue.put(Delay(Duration::from_millis(30))).unwrap();
        queue.put(Delay(Duration::from_millis(10))).unwrap();
        queue.put(Delay(Duration::from_millis(20))).unwrap();

        let first = queue.take();
        let second = queue.take();
        let third = queue.take();

        assert_eq!(first.0, Duration::from_millis(10));
        assert_eq!(second.0, Duration::from_millis(20));
        assert_eq!(third.0, Duration::from_millis(30));
    }

    #[test]
    fn a_later_insertion_with_an_earlier_deadline_wakes_the_waiter_sooner() {
        let queue: Arc<DelayQueue<Delay>> = Arc::new(DelayQueue::new());
        queue.put(Delay(Duration::from_secs(5))).unwrap();

        let queue2 = Arc::clone(&queue);
        let handle = thread::spawn(move || {
            let started = Instant::now();
            let value = queue2.take();
            (started.elapsed(), value.0)
        });

        thread::sleep(Duration::from_millis(20));
        queue.put(Delay(Duration::from_millis(10))).unwrap();

        let (elapsed, delay) = handle.join().unwrap();
        assert_eq!(delay, Duration::from_millis(10));
        assert!(elapsed < Duration::from_secs(1));
    }

    #[test]
    fn poll_timeout_returns_none_if_the_deadline_has_not_passed_in_time() {
        let queue = DelayQueue::new();
        queue.put(Delay(Duration::from_secs(5))).unwrap();
        assert_eq!(queue.poll_timeout(Duration::from_millis(20)), None);
    }

    #[test]
    fn dequeue_time_never_precedes_the_declared_delay() {
        let queue = DelayQueue::new();
        let submitted_at = Instant::now();
        queue.put(Delay(Duration::from_millis(25))).unwrap();

        let value = queue.take();
        assert!(submitted_at.elapsed() >= value.0);
    }

    #[test]
    fn two_idle_waiters_each_receive_one_of_two_insertions_behind_an_unchanged_head() {
        // Both consumers start waiting on an empty heap; the first insertion
        // becomes the head (waking one waiter) and the second lands behind
        // it without changing the head, so it must still wake the other
        // waiter rather than stranding it.
        let queue: Arc<DelayQueue<Delay>> = Arc::new(DelayQueue::new());

        let mut consumers = Vec::new();
        for _ in 0..2 {
            let queue = Arc::clone(&queue);
            consumers.push(thread::spawn(move || queue.take().0));
        }
        thread::sleep(Duration::from_millis(20));

        queue.put(Delay(Duration::from_millis(5))).unwrap();
        queue.put(Delay(Duration::from_millis(200))).unwrap();

        let mut received: Vec<Duration> = consumers.into_iter().map(|h| h.join().unwrap()).collect();
        received.sort();
        assert_eq!(received, vec![Duration::from_millis(5), Duration::from_millis(200)]);
    }
}
