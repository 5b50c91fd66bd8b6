//! An elastic worker pool that grows on demand and retires idle workers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info};

use crate::pool::{run_job, Job};
use crate::queue::{BlockingQueue, RendezvousQueue};
use crate::Mutex;

struct WorkerHandle {
    id: u64,
    handle: Option<JoinHandle<()>>,
}

struct Membership {
    workers: Vec<WorkerHandle>,
    safe_shutdown_started: bool,
    shutdown: bool,
    terminated: bool,
}

struct Shared {
    queue: RendezvousQueue<Job>,
    idle_timeout: Duration,
    next_worker_id: AtomicU64,
    /// Guards worker membership and the shutdown flags. Distinct from the
    /// rendezvous queue's own internal mutex — submitters and the self-retire
    /// helper take this one first, then (for submit) the queue's, never the
    /// reverse, so the two mutexes never deadlock against each other.
    membership: Mutex<Membership>,
}

/// An elastic pool with no permanent workers: a [`RendezvousQueue`] hands
/// jobs directly to an already-idle worker when one is waiting, and a new
/// worker is spawned — carrying the job as its first task — only when none
/// is.
///
/// A worker that finds no further job within `idle_timeout` retires itself.
/// Because the rendezvous queue only ever grows the pool when no consumer
/// was available to take the job immediately, the number of live workers at
/// any instant never exceeds the number of submissions that were
/// outstanding at that instant.
///
/// Idle workers are only woken by a new job or by their own timeout — a
/// shutdown does not interrupt a worker's idle wait, so a joining shutdown
/// can take up to `idle_timeout` to return if a worker happens to have just
/// begun waiting. This mirrors the rendezvous queue having no concept of a
/// close signal; teaching it one is out of scope for this pool's contract.
pub struct CachedThreadPool {
    inner: Arc<Shared>,
}

impl CachedThreadPool {
    /// Creates an empty cached pool with the given worker idle timeout.
    #[must_use]
    pub fn new(idle_timeout: Duration) -> Self {
        info!(idle_timeout_ms = idle_timeout.as_millis(), "cached thread pool started");
        Self {
            inner: Arc::new(Shared {
                queue: RendezvousQueue::new(),
                idle_timeout,
                next_worker_id: AtomicU64::new(0),
                membership: Mutex::new(Membership {
                    workers: Vec::new(),
                    safe_shutdown_started: false,
                    shutdown: false,
                    terminated: false,
                }),
            }),
        }
    }

    /// Submits a job for execution.
    ///
    /// If a worker is already idle and waiting, it takes the job directly
    /// with no new thread spawned. Otherwise a new worker is spawned to run
    /// it. Silently dropped if the pool has been shut down.
    pub fn submit<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let job: Job = Box::new(job);
        let mut membership = self.inner.membership.lock();
        if membership.shutdown {
            return;
        }
        if let Err(job) = self.inner.queue.try_offer(job) {
            spawn_worker(&self.inner, &mut membership, job);
        }
    }

    /// Begins shutdown: no further submissions are accepted, and every live
    /// worker is joined-or-detached. Unlike [`crate::pool::FixedThreadPool`],
    /// there is no separate drain phase distinct from the rendezvous
    /// handoff itself, so this and [`Self::shutdown_now`] perform the same
    /// action.
    ///
    /// If `join` is `true`, blocks until every worker has actually stopped.
    pub fn shutdown(&self, join: bool) {
        self.shutdown_impl(join);
    }

    /// Equivalent to [`Self::shutdown`] for this pool — see its docs for why
    /// the two modes collapse here.
    pub fn shutdown_now(&self, join: bool) {
        self.shutdown_impl(join);
    }

    fn shutdown_impl(&self, join: bool) {
        let mut membership = self.inner.membership.lock();
        membership.safe_shutdown_started = true;
        membership.shutdown = true;
        let workers = std::mem::take(&mut membership.workers);
        drop(membership);

        if join {
            for mut worker in workers {
                if let Some(handle) = worker.handle.take() {
                    let _ = handle.join();
                }
            }
            self.inner.membership.lock().terminated = true;
        }
    }

    /// Whether shutdown has begun (monotonic).
    #[must_use]
    pub fn is_safe_shutdown_started(&self) -> bool {
        self.inner.membership.lock().safe_shutdown_started
    }

    /// Whether the pool has stopped accepting and dispatching jobs
    /// (monotonic).
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.inner.membership.lock().shutdown
    }

    /// Whether every worker has been confirmed stopped via a joining
    /// shutdown (monotonic).
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.inner.membership.lock().terminated
    }

    /// A snapshot of the current live worker count.
    ///
    /// Racy by design: by the time the caller observes the value, a worker
    /// may have been spawned or retired. Useful for tests and metrics, not
    /// for synchronization.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.inner.membership.lock().workers.len()
    }
}

fn spawn_worker(inner: &Arc<Shared>, membership: &mut Membership, initial_job: Job) {
    let id = inner.next_worker_id.fetch_add(1, Ordering::Relaxed);
    let inner_for_worker = Arc::clone(inner);
    let handle = thread::Builder::new()
        .name(format!("cached-pool-worker-{id}"))
        .spawn(move || worker_loop(&inner_for_worker, id, initial_job))
        .expect("failed to spawn cached thread pool worker");
    membership.workers.push(WorkerHandle { id, handle: Some(handle) });
}

fn worker_loop(inner: &Arc<Shared>, id: u64, mut job: Job) {
    loop {
        run_job(job);

        if inner.membership.lock().shutdown {
            return;
        }

        match inner.queue.poll_timeout(inner.idle_timeout) {
            Some(next) => job = next,
            None => {
                retire(inner, id);
                return;
            }
        }
    }
}

/// Removes `id` from the worker list and joins it, via a short-lived
/// detached helper thread — a worker cannot join itself.
fn retire(inner: &Arc<Shared>, id: u64) {
    let inner = Arc::clone(inner);
    thread::Builder::new()
        .name(format!("cached-pool-reaper-{id}"))
        .spawn(move || {
            let mut membership = inner.membership.lock();
            if membership.shutdown {
                // The shutdown path owns reaping every worker; it will join
                // this one itself (or already has).
                return;
            }
            let Some(pos) = membership.workers.iter().position(|w| w.id == id) else {
                return;
            };
            let mut worker = membership.workers.remove(pos);
            drop(membership);

            if let Some(handle) = worker.handle.take() {
                let _ = handle.join();
            }
            debug!(worker_id = id, "cached pool worker retired");
        })
        .expect("failed to spawn cached pool reaper thread");
}

/// Creates an elastic pool whose idle workers retire after
/// `idle_timeout_ms` milliseconds without a new job.
#[must_use]
pub fn make_cached_pool(idle_timeout_ms: u16) -> CachedThreadPool {
    CachedThreadPool::new(Duration::from_millis(u64::from(idle_timeout_ms)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Barrier;

    #[test]
    fn submit_spawns_a_worker_when_none_is_idle() {
        let pool = CachedThreadPool::new(Duration::from_millis(200));
        assert_eq!(pool.worker_count(), 0);

        let done = Arc::new(AtomicUsize::new(0));
        let done2 = Arc::clone(&done);
        pool.submit(move || {
            done2.fetch_add(1, Ordering::SeqCst);
        });

        thread::sleep(Duration::from_millis(30));
        assert_eq!(done.load(Ordering::SeqCst), 1);
        assert_eq!(pool.worker_count(), 1);
    }

    #[test]
    fn worker_count_grows_with_concurrent_long_jobs_then_shrinks_when_idle() {
        let pool = Arc::new(CachedThreadPool::new(Duration::from_millis(100)));
        let barrier = Arc::new(Barrier::new(6));

        for _ in 0..5 {
            let barrier = Arc::clone(&barrier);
            pool.submit(move || {
                barrier.wait();
            });
        }

        thread::sleep(Duration::from_millis(50));
        barrier.wait();
        assert_eq!(pool.worker_count(), 5);

        thread::sleep(Duration::from_millis(250));
        assert_eq!(pool.worker_count(), 0);
    }

    #[test]
    fn an_idle_worker_accepts_the_next_job_without_spawning_another() {
        let pool = CachedThreadPool::new(Duration::from_millis(300));
        pool.submit(|| {});
        thread::sleep(Duration::from_millis(30));
        assert_eq!(pool.worker_count(), 1);

        pool.submit(|| {});
        thread::sleep(Duration::from_millis(30));
        assert_eq!(pool.worker_count(), 1);
    }

    #[test]
    fn shutdown_joins_every_worker() {
        let pool = CachedThreadPool::new(Duration::from_secs(5));
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..4 {
            let counter = Arc::clone(&counter);
            pool.submit(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }

        thread::sleep(Duration::from_millis(30));
        pool.shutdown(true);

        assert!(pool.is_safe_shutdown_started());
        assert!(pool.is_shutdown());
        assert!(pool.is_terminated());
        assert_eq!(pool.worker_count(), 0);
    }

    #[test]
    fn submission_after_shutdown_is_dropped_silently() {
        let pool = CachedThreadPool::new(Duration::from_millis(50));
        pool.shutdown(true);

        let ran = Arc::new(AtomicUsize::new(0));
        let ran2 = Arc::clone(&ran);
        pool.submit(move || {
            ran2.fetch_add(1, Ordering::SeqCst);
        });

        thread::sleep(Duration::from_millis(20));
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }
}
