//! Petek: quiescence-based deferred memory reclamation for lock-free
//! data structures.
//!
//! Nodes unlinked from a lock-free structure cannot be freed on the spot:
//! another thread may still be dereferencing them. Petek defers the free
//! instead. Unlinked allocations are retired onto a lock-free list, worker
//! threads bracket their accesses by pinning a per-thread slot, and a
//! periodic sweep cycles through every slot lock — waiting out whatever
//! critical sections were in flight — before dropping everything queued.
//!
//! No reference counting, no garbage collector, no epochs to age out: one
//! full cycle through the slot bank *is* the quiescence proof.
//!
//! # Pieces
//!
//! - [`Spinlock`] — TTAS spinlock with RAII unlock, the slot primitive.
//! - [`FreeList`] — lock-free push / atomic pull-all-and-reset list.
//! - [`Retired`] — a type-erased owned allocation awaiting its drop.
//! - [`Reclaimer`] — the slot bank + retirement list; [`Reclaimer::pin`],
//!   [`Reclaimer::retire`], [`Reclaimer::sweep`].
//! - [`Atomic`] / [`Shared`] — the pointer word lock-free structures
//!   mutate, with guard-scoped loads.
//!
//! # Example
//!
//! ```
//! use core::sync::atomic::Ordering;
//! use petek::{Atomic, Reclaimer, Retired, Shared};
//!
//! let reclaimer = Reclaimer::new(2);
//! let cell = Atomic::new(Box::into_raw(Box::new(41u32)));
//!
//! // Worker on slot 0: read, then replace.
//! {
//!     let guard = reclaimer.pin(0);
//!     let old = cell.load(Ordering::Acquire, &guard);
//!     assert_eq!(unsafe { *old.deref() }, 41);
//!
//!     let new = Box::into_raw(Box::new(42u32));
//!     let prev = cell.swap(unsafe { Shared::from_raw(new) }, Ordering::AcqRel, &guard);
//!     // The old value may still be read elsewhere: retire it, don't drop it.
//!     reclaimer.retire(unsafe { Retired::from_raw(prev.as_raw()) });
//! }
//!
//! // From a thread holding no guard: prove quiescence, then free.
//! reclaimer.sweep();
//!
//! // Teardown with exclusive access.
//! unsafe { drop(Box::from_raw(cell.load_unprotected(Ordering::Relaxed))) };
//! ```
//!
//! # What this is not
//!
//! The slot locks order reclamation against readers; they are **not** a
//! lock on the protected structure, whose mutations stay CAS-based and
//! lock-free. The scheme also assumes cooperative workers: a thread that
//! parks forever inside a pinned section stalls [`Reclaimer::sweep`]
//! indefinitely.

#![no_std]
#![warn(missing_docs)]

extern crate alloc;

mod atomic;
mod free_list;
mod reclaim;
mod retired;
mod spin;

pub use atomic::{Atomic, Shared};
pub use free_list::{Drain, FreeList};
pub use reclaim::{Guard, Reclaimer};
pub use retired::Retired;
pub use spin::{SpinGuard, Spinlock};
