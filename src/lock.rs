//! A scoped mutex guard that runs user hooks on acquisition and release.
//!
//! This is the leaf building block used by [`crate::queue::RendezvousQueue`]
//! to keep its waiter counters atomic with the critical section they guard:
//! the hook that increments a counter runs *inside* the lock, at the same
//! moment the guard is handed to the caller, and the hook that decrements it
//! runs *inside* the lock, at the same moment the guard is torn down —
//! regardless of which path (normal return, early return, panic unwind)
//! leads there.
//!
//! # Examples
//!
//! ```
//! use prometheus_parking_lot::{HookedLock, Mutex};
//!
//! let mutex = Mutex::new(0_i32);
//! let mut acquired = false;
//! let mut released = false;
//!
//! {
//!     let mut guard = HookedLock::acquire(
//!         &mutex,
//!         |_value| acquired = true,
//!         |_value| released = true,
//!     );
//!     *guard += 1;
//! }
//!
//! assert!(acquired);
//! assert!(released);
//! assert_eq!(*mutex.lock(), 1);
//! ```

use std::ops::{Deref, DerefMut};

use crate::{Mutex, MutexGuard};

/// Acquires mutexes and attaches a pair of acquire/release hooks to the
/// resulting guard.
///
/// There is no state to hold here beyond the associated functions; the type
/// exists so the acquisition API reads as a noun (`HookedLock::acquire`)
/// rather than a bare free function.
#[derive(Debug, Default, Clone, Copy)]
pub struct HookedLock;

impl HookedLock {
    /// Locks `mutex`, runs `on_acquire` on the freshly acquired value, and
    /// returns a guard that will run `on_release` immediately before the
    /// mutex is unlocked.
    ///
    /// `on_acquire` runs synchronously, before this call returns, with the
    /// lock held. `on_release` is guaranteed to run exactly once, whenever
    /// the returned guard is dropped — including during unwinding.
    pub fn acquire<'a, T, A, R>(mutex: &'a Mutex<T>, on_acquire: A, on_release: R) -> HookedGuard<'a, T>
    where
        A: FnOnce(&mut T),
        R: FnOnce(&mut T) + 'a,
    {
        let mut guard = mutex.lock();
        on_acquire(&mut guard);
        HookedGuard {
            guard: Some(guard),
            on_release: Some(Box::new(on_release)),
        }
    }
}

/// A held mutex guard paired with a release hook.
///
/// Move-only: it owns a [`MutexGuard`] and a boxed release closure, neither
/// of which is cloneable, so the guard cannot be duplicated and the release
/// hook cannot be invoked more than once.
pub struct HookedGuard<'a, T> {
    guard: Option<MutexGuard<'a, T>>,
    on_release: Option<Box<dyn FnOnce(&mut T) + 'a>>,
}

impl<'a, T> HookedGuard<'a, T> {
    /// Exposes the underlying [`MutexGuard`] directly.
    ///
    /// Needed by callers that must hand the guard to an API expecting a
    /// concrete `MutexGuard`, such as [`crate::Condvar`]'s wait methods —
    /// `Deref`/`DerefMut` alone cannot satisfy that kind of signature.
    pub fn guard_mut(&mut self) -> &mut MutexGuard<'a, T> {
        self.guard.as_mut().expect("guard present until drop")
    }
}

impl<T> Deref for HookedGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.guard.as_deref().expect("guard present until drop")
    }
}

impl<T> DerefMut for HookedGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.guard.as_deref_mut().expect("guard present until drop")
    }
}

impl<T> Drop for HookedGuard<'_, T> {
    fn drop(&mut self) {
        if let (Some(hook), Some(mut guard)) = (self.on_release.take(), self.guard.take()) {
            hook(&mut guard);
        }
    }
}
