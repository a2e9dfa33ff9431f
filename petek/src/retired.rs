//! Type-erased retired allocations.
//!
//! A [`Retired`] is an owned heap allocation whose type has been erased down
//! to a pointer and a destructor function, so that one free-list can queue
//! allocations of different types (map nodes and user values alike) for
//! deferred dropping.

use alloc::boxed::Box;

/// Type-erased destructor function.
type DropFn = unsafe fn(*mut ());

/// An owned, type-erased heap allocation awaiting reclamation.
///
/// Dropping a `Retired` runs the original type's destructor and frees the
/// allocation. Exactly-once consumption is guaranteed by ownership: a
/// `Retired` can be constructed from a `Box` only once and is dropped only
/// once.
pub struct Retired {
    ptr: *mut (),
    drop_fn: DropFn,
}

// SAFETY: construction requires `T: Send`, so the erased allocation may be
// dropped on whichever thread drains the free-list.
unsafe impl Send for Retired {}

impl Retired {
    /// Erase a boxed value.
    pub fn new<T: Send + 'static>(boxed: Box<T>) -> Self {
        // SAFETY: called exactly once, from `Drop`, with the pointer this
        // `Retired` was constructed with.
        unsafe fn drop_boxed<T>(ptr: *mut ()) {
            drop(unsafe { Box::from_raw(ptr.cast::<T>()) });
        }
        Self {
            ptr: Box::into_raw(boxed).cast(),
            drop_fn: drop_boxed::<T>,
        }
    }

    /// Erase a raw allocation previously produced by [`Box::into_raw`].
    ///
    /// # Safety
    ///
    /// - `ptr` must have come from `Box::into_raw(Box<T>)` and must not have
    ///   been freed or wrapped in another `Retired` since.
    /// - After this call the allocation is owned by the returned `Retired`;
    ///   the caller must not free it through any other path.
    pub unsafe fn from_raw<T: Send + 'static>(ptr: *mut T) -> Self {
        unsafe fn drop_boxed<T>(ptr: *mut ()) {
            drop(unsafe { Box::from_raw(ptr.cast::<T>()) });
        }
        Self {
            ptr: ptr.cast(),
            drop_fn: drop_boxed::<T>,
        }
    }
}

impl Drop for Retired {
    fn drop(&mut self) {
        // SAFETY: `ptr` was produced by `Box::into_raw` for the type the
        // destructor was instantiated with, and ownership is unique.
        unsafe { (self.drop_fn)(self.ptr) }
    }
}
