/*!
 * Cancellation
 * Termination flag that wakes whatever is blocked on the owner's behalf
 */

use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Callback that wakes one blocked waiter
pub type Waker = Arc<dyn Fn() + Send + Sync>;

/// One-shot cancellation flag with registered wakers
///
/// A blocking operation registers a waker for the duration of its wait,
/// then checks `is_cancelled` under its own lock before sleeping. `cancel`
/// sets the flag first and runs wakers afterwards, so a waiter either sees
/// the flag or receives the wakeup.
#[derive(Default)]
pub struct CancelToken {
    cancelled: AtomicBool,
    next_key: AtomicU64,
    wakers: Mutex<Vec<(u64, Waker)>>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Set the flag and wake every registered waiter; idempotent
    pub fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }
        // Wakers run without the registry lock; they take waiter-side locks
        let wakers: Vec<Waker> = self
            .wakers
            .lock()
            .iter()
            .map(|(_, waker)| Arc::clone(waker))
            .collect();
        for wake in wakers {
            wake();
        }
    }

    /// Install `waker` until the returned registration drops
    pub fn register(&self, waker: Waker) -> WakerRegistration<'_> {
        let key = self.next_key.fetch_add(1, Ordering::Relaxed);
        self.wakers.lock().push((key, waker));
        WakerRegistration { token: self, key }
    }

    /// Wakers currently installed
    pub fn waiters(&self) -> usize {
        self.wakers.lock().len()
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .field("waiters", &self.waiters())
            .finish()
    }
}

/// Scoped waker registration
#[must_use = "the waker is removed as soon as the registration drops"]
pub struct WakerRegistration<'a> {
    token: &'a CancelToken,
    key: u64,
}

impl Drop for WakerRegistration<'_> {
    fn drop(&mut self) {
        self.token.wakers.lock().retain(|(key, _)| *key != self.key);
    }
}
