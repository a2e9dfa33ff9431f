//! Lock-free concurrent hash map with fixed-size byte keys, built on the
//! petek reclamation scheme.
//!
//! The map is an array of bucket chains whose count is fixed at
//! construction. Keys are byte blocks of one configured length, copied into
//! the node and compared by exact byte equality; values are opaque heap
//! allocations the map stores by pointer. Inserts, replacements and removals
//! mutate the chains only through compare-and-swap — two threads racing on
//! the same bucket never block each other, they retry.
//!
//! Unlinked nodes and superseded values are never freed in place. They are
//! retired into the map's [`petek::Reclaimer`]; a periodic [`ByteMap::sweep`]
//! cycles the per-worker slot locks to wait out in-flight operations and
//! only then drops what was queued.
//!
//! # Example
//!
//! ```
//! use petek_map::ByteMap;
//! use std::sync::Arc;
//! use std::thread;
//!
//! // 256 buckets, 8-byte keys, one slot per worker thread.
//! let map: Arc<ByteMap<u64>> = Arc::new(ByteMap::new(256, 8, 2));
//!
//! let writers: Vec<_> = (0..2u64)
//!     .map(|slot| {
//!         let map = Arc::clone(&map);
//!         thread::spawn(move || {
//!             let guard = map.pin(slot as usize);
//!             let key = slot.to_be_bytes();
//!             map.put_and_free(&key, Box::new(slot * 10), &guard);
//!         })
//!     })
//!     .collect();
//! for w in writers {
//!     w.join().unwrap();
//! }
//!
//! let guard = map.pin(0);
//! assert_eq!(map.get(&1u64.to_be_bytes(), &guard), Some(&10));
//! ```

#![no_std]
#![warn(missing_docs)]

extern crate alloc;

mod map;

pub use map::{ByteMap, Iter, MAX_KEY_LEN};

pub use petek::{Guard, Reclaimer, Shared};
