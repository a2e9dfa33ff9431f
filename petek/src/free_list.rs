//! Lock-free free-list: concurrent push plus an atomic pull-all-and-reset.
//!
//! The list is a Treiber-style stack of heap links. Producers `push`
//! concurrently; a consumer detaches the entire chain in a single atomic
//! exchange with `take_all` and walks it off-line. An element that races
//! with `take_all` ends up either in the detached chain or in the fresh
//! list, never in both and never in neither.

use alloc::boxed::Box;
use core::marker::PhantomData;
use core::ptr;
use core::sync::atomic::{AtomicPtr, Ordering};
use crossbeam_utils::Backoff;

struct Link<T> {
    item: T,
    next: *mut Link<T>,
}

/// A lock-free singly linked list of owned items.
///
/// # Example
///
/// ```
/// use petek::FreeList;
///
/// let list = FreeList::new();
/// list.push(1u32);
/// list.push(2);
///
/// let drained: Vec<u32> = list.take_all().collect();
/// assert_eq!(drained.len(), 2);
/// assert!(list.is_empty());
/// ```
pub struct FreeList<T> {
    head: AtomicPtr<Link<T>>,
}

// SAFETY: the list owns its items; moving the list (or draining it from
// another thread) moves the owned `T`s, so `T: Send` is all that is needed.
unsafe impl<T: Send> Send for FreeList<T> {}
unsafe impl<T: Send> Sync for FreeList<T> {}

impl<T> FreeList<T> {
    /// Create a new, empty list.
    pub const fn new() -> Self {
        Self {
            head: AtomicPtr::new(ptr::null_mut()),
        }
    }

    /// Push an item onto the list.
    ///
    /// Lock-free: the new link is spliced at the head with a CAS retry loop
    /// and the operation never fails, only retries.
    pub fn push(&self, item: T) {
        let link = Box::into_raw(Box::new(Link {
            item,
            next: ptr::null_mut(),
        }));
        let backoff = Backoff::new();
        let mut head = self.head.load(Ordering::Relaxed);
        loop {
            // SAFETY: `link` is not published until the CAS succeeds, so the
            // write cannot race with a reader.
            unsafe {
                (*link).next = head;
            }
            match self
                .head
                .compare_exchange_weak(head, link, Ordering::Release, Ordering::Relaxed)
            {
                Ok(_) => return,
                Err(actual) => {
                    head = actual;
                    backoff.spin();
                }
            }
        }
    }

    /// Detach every element currently in the list, leaving it empty.
    ///
    /// The whole chain comes off in one atomic exchange. The returned
    /// [`Drain`] owns the detached links and yields the items in pop order
    /// (most recently pushed first); links are freed as the iterator
    /// advances, and any items not yet yielded are dropped with it.
    pub fn take_all(&self) -> Drain<T> {
        let head = self.head.swap(ptr::null_mut(), Ordering::Acquire);
        Drain {
            head,
            _marker: PhantomData,
        }
    }

    /// Detach and drop everything currently in the list.
    pub fn drain(&self) {
        drop(self.take_all());
    }

    /// Whether the list currently holds no elements.
    ///
    /// Racy under concurrent pushes; exact only when externally quiesced.
    pub fn is_empty(&self) -> bool {
        self.head.load(Ordering::Acquire).is_null()
    }
}

impl<T> Default for FreeList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for FreeList<T> {
    fn drop(&mut self) {
        self.drain();
    }
}

/// Owning iterator over a chain detached by [`FreeList::take_all`].
pub struct Drain<T> {
    head: *mut Link<T>,
    _marker: PhantomData<Box<Link<T>>>,
}

// SAFETY: a detached chain is reachable only through this iterator.
unsafe impl<T: Send> Send for Drain<T> {}

impl<T> Iterator for Drain<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        if self.head.is_null() {
            return None;
        }
        // SAFETY: every link in the detached chain came from `Box::into_raw`
        // in `push` and is owned exclusively by this iterator.
        let link = unsafe { Box::from_raw(self.head) };
        self.head = link.next;
        Some(link.item)
    }
}

impl<T> Drop for Drain<T> {
    fn drop(&mut self) {
        for item in self.by_ref() {
            drop(item);
        }
    }
}
