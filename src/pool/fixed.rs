//! A permanent, fixed-size worker pool.

use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::info;

use crate::error::ConcurrencyError;
use crate::pool::{run_job, Job};
use crate::{Condvar, Mutex};

struct State {
    jobs: VecDeque<Job>,
    /// Jobs popped from the queue but not yet finished executing. Tracked
    /// separately from `jobs.len()` so a graceful shutdown can wait for
    /// actual completion, not just removal from the queue — otherwise a
    /// fast-finishing job popped after a slow one could fire the drain
    /// signal while the slow job is still running.
    in_flight: u32,
    safe_shutdown_started: bool,
    shutdown: bool,
    terminated: bool,
}

struct Inner {
    state: Mutex<State>,
    runner_cv: Condvar,
    drain_cv: Condvar,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

/// A pool of `n_workers` permanent OS threads consuming a shared,
/// unbounded job queue.
///
/// Supports two shutdown modes: [`FixedThreadPool::shutdown`], which drains
/// already-submitted jobs before stopping workers, and
/// [`FixedThreadPool::shutdown_now`], which abandons any jobs still queued.
/// Both accept a `join` flag controlling whether the caller blocks until
/// workers have actually stopped.
pub struct FixedThreadPool {
    inner: Arc<Inner>,
}

impl FixedThreadPool {
    /// Creates a pool of `n_workers` permanent worker threads.
    ///
    /// # Errors
    ///
    /// Returns [`ConcurrencyError::ZeroWorkers`] if `n_workers == 0`.
    pub fn new(n_workers: usize) -> Result<Self, ConcurrencyError> {
        if n_workers == 0 {
            return Err(ConcurrencyError::ZeroWorkers);
        }

        let inner = Arc::new(Inner {
            state: Mutex::new(State {
                jobs: VecDeque::new(),
                in_flight: 0,
                safe_shutdown_started: false,
                shutdown: false,
                terminated: false,
            }),
            runner_cv: Condvar::new(),
            drain_cv: Condvar::new(),
            workers: Mutex::new(Vec::with_capacity(n_workers)),
        });

        {
            let mut workers = inner.workers.lock();
            for id in 0..n_workers {
                let inner = Arc::clone(&inner);
                let handle = thread::Builder::new()
                    .name(format!("fixed-pool-worker-{id}"))
                    .spawn(move || worker_loop(&inner))
                    .expect("failed to spawn fixed thread pool worker");
                workers.push(handle);
            }
        }

        info!(n_workers, "fixed thread pool started");
        Ok(Self { inner })
    }

    /// Submits a job for execution by one of the pool's workers.
    ///
    /// Silently dropped if called after [`Self::shutdown`] or
    /// [`Self::shutdown_now`] has begun — this is an expected concurrency
    /// outcome, not an error condition, so nothing is returned to detect it.
    pub fn submit<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = self.inner.state.lock();
        if state.safe_shutdown_started || state.shutdown {
            return;
        }
        state.jobs.push_back(Box::new(job));
        drop(state);
        self.inner.runner_cv.notify_one();
    }

    /// Begins a graceful shutdown: no further submissions are accepted, but
    /// jobs already queued (and the one, if any, currently executing on each
    /// worker) run to completion before workers stop.
    ///
    /// Runs on a detached helper thread so the drain wait never blocks the
    /// caller's thread directly. If `join` is `true`, this call blocks until
    /// the helper (and therefore the full drain and stop) has completed;
    /// if `false`, it returns immediately and the drain proceeds in the
    /// background.
    pub fn shutdown(&self, join: bool) {
        let inner = Arc::clone(&self.inner);
        let helper = thread::Builder::new()
            .name("fixed-pool-shutdown".to_string())
            .spawn(move || {
                {
                    let mut state = inner.state.lock();
                    if state.safe_shutdown_started || state.shutdown {
                        return;
                    }
                    state.safe_shutdown_started = true;
                }
                {
                    let mut state = inner.state.lock();
                    inner
                        .drain_cv
                        .wait_while(&mut state, |s| !(s.jobs.is_empty() && s.in_flight == 0));
                }
                shutdown_now(&inner, true);
            })
            .expect("failed to spawn fixed pool shutdown helper");

        if join {
            let _ = helper.join();
        }
    }

    /// Shuts the pool down immediately: already-queued jobs are abandoned
    /// and no further jobs run.
    ///
    /// If `join` is `true`, blocks until every worker thread has actually
    /// stopped, after which [`Self::is_terminated`] is `true`. If `false`,
    /// worker handles are dropped without joining — Rust threads run to
    /// completion regardless of whether their handle is joined, but a
    /// worker wedged inside a pathological job will then leak for the
    /// remainder of its (unbounded) lifetime, since nothing is left to
    /// observe or bound its exit. Prefer `join = true` unless a worker is
    /// already known or suspected to be stuck.
    pub fn shutdown_now(&self, join: bool) {
        shutdown_now(&self.inner, join);
    }

    /// Whether a graceful shutdown has begun (monotonic: never reverts to
    /// `false`).
    #[must_use]
    pub fn is_safe_shutdown_started(&self) -> bool {
        self.inner.state.lock().safe_shutdown_started
    }

    /// Whether the pool has been told to stop accepting and running jobs
    /// (monotonic).
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.inner.state.lock().shutdown
    }

    /// Whether every worker has been confirmed stopped via a joining
    /// shutdown (monotonic).
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.inner.state.lock().terminated
    }
}

fn shutdown_now(inner: &Arc<Inner>, join: bool) {
    {
        let mut state = inner.state.lock();
        state.shutdown = true;
    }
    inner.runner_cv.notify_all();

    let mut workers = inner.workers.lock();
    if join {
        for worker in workers.drain(..) {
            let _ = worker.join();
        }
        inner.state.lock().terminated = true;
    } else {
        workers.clear();
    }
}

fn worker_loop(inner: &Arc<Inner>) {
    loop {
        let job = {
            let mut state = inner.state.lock();
            inner.runner_cv.wait_while(&mut state, |s| s.jobs.is_empty() && !s.shutdown);
            if state.shutdown {
                return;
            }
            let job = state.jobs.pop_front().expect("predicate guarantees a queued job");
            state.in_flight += 1;
            job
        };

        run_job(job);

        let should_signal_drained = {
            let mut state = inner.state.lock();
            state.in_flight -= 1;
            state.safe_shutdown_started && state.jobs.is_empty() && state.in_flight == 0
        };
        if should_signal_drained {
            inner.drain_cv.notify_all();
        }
    }
}

/// Creates a fixed-size pool of `n_workers` worker threads.
///
/// # Errors
///
/// Returns [`ConcurrencyError::ZeroWorkers`] if `n_workers == 0`.
pub fn make_fixed_pool(n_workers: u16) -> Result<FixedThreadPool, ConcurrencyError> {
    FixedThreadPool::new(usize::from(n_workers))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn zero_workers_is_rejected() {
        assert!(matches!(FixedThreadPool::new(0), Err(ConcurrencyError::ZeroWorkers)));
    }

    #[test]
    fn drain_runs_every_submitted_job_exactly_once() {
        let pool = FixedThreadPool::new(10).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..100 {
            let counter = Arc::clone(&counter);
            pool.submit(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }

        pool.shutdown(true);

        assert_eq!(counter.load(Ordering::SeqCst), 100);
        assert!(pool.is_safe_shutdown_started());
        assert!(pool.is_shutdown());
        assert!(pool.is_terminated());
    }

    #[test]
    fn immediate_shutdown_does_not_deadlock_and_terminates() {
        let pool = FixedThreadPool::new(10).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..100 {
            let counter = Arc::clone(&counter);
            pool.submit(move || {
                thread::sleep(Duration::from_millis(1));
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }

        pool.shutdown_now(true);

        assert!(counter.load(Ordering::SeqCst) <= 100);
        assert!(pool.is_terminated());
    }

    #[test]
    fn submission_after_shutdown_is_dropped_silently() {
        let pool = FixedThreadPool::new(2).unwrap();
        pool.shutdown(true);

        let ran = Arc::new(AtomicUsize::new(0));
        let ran2 = Arc::clone(&ran);
        pool.submit(move || {
            ran2.fetch_add(1, Ordering::SeqCst);
        });

        thread::sleep(Duration::from_millis(20));
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn monotonic_flags_hold_throughout_the_lifecycle() {
        let pool = FixedThreadPool::new(4).unwrap();
        assert!(!pool.is_safe_shutdown_started());
        assert!(!pool.is_shutdown());
        assert!(!pool.is_terminated());

        pool.shutdown(true);

        assert!(pool.is_safe_shutdown_started());
        assert!(pool.is_shutdown());
        assert!(pool.is_terminated());
    }

    #[test]
    fn a_panicking_job_does_not_stop_the_pool() {
        let pool = FixedThreadPool::new(2).unwrap();
        let after = Arc::new(AtomicUsize::new(0));

        pool.submit(|| panic!("boom"));

        let after2 = Arc::clone(&after);
        pool.submit(move || {
            after2.fetch_add(1, Ordering::SeqCst);
        });

        pool.shutdown(true);
        assert_eq!(after.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn non_joining_shutdown_returns_without_waiting_for_workers() {
        let pool = FixedThreadPool::new(1).unwrap();
        let started = std::time::Instant::now();
        pool.shutdown_now(false);
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
