use crate::{RawLock, RawUnlock};
use core::fmt;
use core::hint::spin_loop;
use core::sync::atomic::{AtomicBool, Ordering};

/// A one-bit spin lock.
///
/// Contended waiters spin on a plain load and only retry the
/// compare-exchange once the holder has released.
pub struct RawSpin {
    locked: AtomicBool,
}

impl RawSpin {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            locked: AtomicBool::new(false),
        }
    }

    /// Snapshot of the lock bit. Stale as soon as it is returned.
    #[inline]
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }

    #[inline]
    fn acquire(&self) -> bool {
        self.locked
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }
}

impl Default for RawSpin {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RawSpin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawSpin").field("locked", &self.is_locked()).finish()
    }
}

impl RawLock for RawSpin {
    fn raw_lock(&self) {
        while !self.acquire() {
            while self.is_locked() {
                spin_loop();
            }
        }
    }

    fn raw_try_lock(&self) -> bool {
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }
}

impl RawUnlock for RawSpin {
    unsafe fn raw_unlock(&self) {
        debug_assert!(self.is_locked(), "unlocking a RawSpin that is not held");
        self.locked.store(false, Ordering::Release);
    }
}
