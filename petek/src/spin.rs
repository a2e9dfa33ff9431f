//! TTAS (test-test-and-set) spinlock.

use core::hint::spin_loop;
use core::sync::atomic::{AtomicBool, Ordering};

/// A TTAS spinlock.
///
/// The lock itself carries no data; it marks a region of execution, not a
/// protected value. `lock()` spins on a relaxed load (the *test* phase, which
/// stays in cache) and only attempts the acquiring swap once the lock looks
/// free. The returned [`SpinGuard`] releases the lock when dropped.
///
/// The unlocked state is the all-zero state, so a `Spinlock` can live in
/// statics and in freshly zeroed arrays.
pub struct Spinlock {
    acquired: AtomicBool,
}

impl Spinlock {
    /// Create a new, unlocked spinlock.
    pub const fn new() -> Self {
        Self {
            acquired: AtomicBool::new(false),
        }
    }

    /// Acquire the lock, spinning until it is available.
    #[inline]
    pub fn lock(&self) -> SpinGuard<'_> {
        loop {
            // Test phase: spin on relaxed load (stays in cache)
            while self.acquired.load(Ordering::Relaxed) {
                spin_loop();
            }
            // Test-and-set phase: attempt to acquire
            if !self.acquired.swap(true, Ordering::Acquire) {
                return SpinGuard { lock: self };
            }
        }
    }

    /// Attempt to acquire the lock without spinning.
    ///
    /// Returns `None` if the lock is currently held.
    #[inline]
    pub fn try_lock(&self) -> Option<SpinGuard<'_>> {
        if self.acquired.swap(true, Ordering::Acquire) {
            None
        } else {
            Some(SpinGuard { lock: self })
        }
    }

    /// Whether the lock is currently held by someone.
    ///
    /// Inherently racy; only useful for diagnostics and tests.
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.acquired.load(Ordering::Relaxed)
    }
}

impl Default for Spinlock {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard for a [`Spinlock`]. Releases the lock on drop.
pub struct SpinGuard<'a> {
    lock: &'a Spinlock,
}

impl Drop for SpinGuard<'_> {
    #[inline]
    fn drop(&mut self) {
        self.lock.acquired.store(false, Ordering::Release);
    }
}
