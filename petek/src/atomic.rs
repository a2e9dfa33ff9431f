//! Atomic pointer substrate: CAS on a pointer-sized word, with loads scoped
//! to a reclamation [`Guard`].
//!
//! [`Atomic<T>`] is the only word the protected structure mutates;
//! [`Shared<'g, T>`] is what a load hands back, branded with the guard's
//! lifetime so it cannot outlive the critical section that produced it.

use crate::reclaim::Guard;
use alloc::boxed::Box;
use core::marker::PhantomData;
use core::ptr;
use core::sync::atomic::{AtomicPtr, Ordering};

/// An atomic pointer to a heap-allocated `T`.
///
/// Supports the full substrate a lock-free structure needs: atomic load and
/// store, unconditional swap, and compare-exchange. Loads take a [`Guard`]
/// and return a [`Shared`] bound to it; the pointee of a `Shared` stays
/// valid at least until the guard drops, provided everything unlinked from
/// the structure is retired to the guard's [`Reclaimer`](crate::Reclaimer)
/// rather than freed in place.
pub struct Atomic<T> {
    data: AtomicPtr<T>,
    _marker: PhantomData<*mut T>,
}

// SAFETY: an `Atomic` is a shared handle to the pointee, so it is Send/Sync
// exactly when `&T` and `T` itself may cross threads.
unsafe impl<T: Send + Sync> Send for Atomic<T> {}
unsafe impl<T: Send + Sync> Sync for Atomic<T> {}

impl<T> Atomic<T> {
    /// Create an atomic holding `ptr`.
    #[inline]
    pub fn new(ptr: *mut T) -> Self {
        Self {
            data: AtomicPtr::new(ptr),
            _marker: PhantomData,
        }
    }

    /// Create a null atomic pointer.
    #[inline]
    pub fn null() -> Self {
        Self::new(ptr::null_mut())
    }

    /// Load the pointer under a guard.
    #[inline]
    pub fn load<'g>(&self, order: Ordering, _guard: &'g Guard<'_>) -> Shared<'g, T> {
        Shared {
            data: self.data.load(order),
            _marker: PhantomData,
        }
    }

    /// Load the pointer without a guard.
    ///
    /// # Safety
    ///
    /// The caller must guarantee the pointee cannot be reclaimed while the
    /// result is in use — typically by holding exclusive access to the
    /// owning structure (`&mut`, or its `Drop`).
    #[inline]
    pub unsafe fn load_unprotected(&self, order: Ordering) -> *mut T {
        self.data.load(order)
    }

    /// Store a pointer.
    #[inline]
    pub fn store(&self, ptr: Shared<'_, T>, order: Ordering) {
        self.data.store(ptr.data, order);
    }

    /// Swap the pointer, returning the previous one.
    #[inline]
    pub fn swap<'g>(&self, new: Shared<'_, T>, order: Ordering, _guard: &'g Guard<'_>) -> Shared<'g, T> {
        Shared {
            data: self.data.swap(new.data, order),
            _marker: PhantomData,
        }
    }

    /// Compare-exchange the pointer.
    ///
    /// On success returns the previous (expected) pointer; on failure
    /// returns the pointer actually found.
    #[inline]
    pub fn compare_exchange<'g>(
        &self,
        current: Shared<'_, T>,
        new: Shared<'_, T>,
        success: Ordering,
        failure: Ordering,
        _guard: &'g Guard<'_>,
    ) -> Result<Shared<'g, T>, Shared<'g, T>> {
        match self
            .data
            .compare_exchange(current.data, new.data, success, failure)
        {
            Ok(prev) => Ok(Shared {
                data: prev,
                _marker: PhantomData,
            }),
            Err(found) => Err(Shared {
                data: found,
                _marker: PhantomData,
            }),
        }
    }

    /// Weak compare-exchange; may fail spuriously. For use in retry loops.
    #[inline]
    pub fn compare_exchange_weak<'g>(
        &self,
        current: Shared<'_, T>,
        new: Shared<'_, T>,
        success: Ordering,
        failure: Ordering,
        _guard: &'g Guard<'_>,
    ) -> Result<Shared<'g, T>, Shared<'g, T>> {
        match self
            .data
            .compare_exchange_weak(current.data, new.data, success, failure)
        {
            Ok(prev) => Ok(Shared {
                data: prev,
                _marker: PhantomData,
            }),
            Err(found) => Err(Shared {
                data: found,
                _marker: PhantomData,
            }),
        }
    }
}

impl<T> Default for Atomic<T> {
    fn default() -> Self {
        Self::null()
    }
}

/// A pointer loaded during a critical section.
///
/// Branded with the guard's lifetime `'g`: the pointee is guaranteed not to
/// be reclaimed before the guard drops, so dereferencing within `'g` is
/// sound as long as every unlink goes through retirement. `Shared` is `Copy`
/// and never owns the pointee.
pub struct Shared<'g, T> {
    data: *mut T,
    _marker: PhantomData<&'g T>,
}

impl<'g, T> Shared<'g, T> {
    /// Wrap a raw pointer.
    ///
    /// # Safety
    ///
    /// If non-null, `ptr` must stay valid for `'g`.
    #[inline]
    pub unsafe fn from_raw(ptr: *mut T) -> Self {
        Self {
            data: ptr,
            _marker: PhantomData,
        }
    }

    /// The null shared pointer.
    #[inline]
    pub fn null() -> Self {
        Self {
            data: ptr::null_mut(),
            _marker: PhantomData,
        }
    }

    /// The raw pointer.
    #[inline]
    pub fn as_raw(&self) -> *mut T {
        self.data
    }

    /// Whether the pointer is null.
    #[inline]
    pub fn is_null(&self) -> bool {
        self.data.is_null()
    }

    /// Borrow the pointee for the guard's lifetime, or `None` if null.
    ///
    /// # Safety
    ///
    /// The pointee must not have been freed outside the reclamation
    /// protocol (e.g. via [`Shared::into_owned`] on another copy).
    #[inline]
    pub unsafe fn as_ref(&self) -> Option<&'g T> {
        if self.data.is_null() {
            None
        } else {
            // SAFETY: non-null, and the caller upholds the liveness contract.
            unsafe { Some(&*self.data) }
        }
    }

    /// Borrow the pointee without a null check.
    ///
    /// # Safety
    ///
    /// The pointer must be non-null, and the pointee must not have been
    /// freed outside the reclamation protocol.
    #[inline]
    pub unsafe fn deref(&self) -> &'g T {
        // SAFETY: caller guarantees non-null and liveness.
        unsafe { &*self.data }
    }

    /// Take ownership of the pointee.
    ///
    /// # Safety
    ///
    /// - The pointer must be non-null and must have come from
    ///   `Box::into_raw`.
    /// - No other thread may still observe the allocation: the caller must
    ///   have established quiescence since it became unreachable (or have
    ///   had exclusive access all along), and no other copy of this
    ///   `Shared` may be used afterwards.
    #[inline]
    pub unsafe fn into_owned(self) -> Box<T> {
        // SAFETY: per the contract above.
        unsafe { Box::from_raw(self.data) }
    }
}

impl<T> Clone for Shared<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Shared<'_, T> {}

impl<T> PartialEq for Shared<'_, T> {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

impl<T> Eq for Shared<'_, T> {}

impl<T> core::fmt::Debug for Shared<'_, T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Shared({:p})", self.data)
    }
}
