//! Byte-key concurrent hash map with CAS-chained buckets.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::hash::BuildHasher;
use core::marker::PhantomData;
use core::sync::atomic::Ordering;
use crossbeam_utils::Backoff;
use foldhash::fast::FixedState;
use petek::{Atomic, Guard, Reclaimer, Retired, Shared};

/// Inline key storage per node: a 64-byte node minus two pointer words.
///
/// The configured key length of a [`ByteMap`] must not exceed this.
pub const MAX_KEY_LEN: usize = 64 - 2 * core::mem::size_of::<usize>();

/// One chain entry: two atomic pointer words, then the inline key block.
///
/// The key is copied in at allocation and never changes; the value pointer
/// is replaced by atomic swap; `next` is the chain link, mutated only by
/// compare-exchange. Nodes are unlinked, never edited out of a chain, and
/// an unlinked node goes to the reclaimer.
#[repr(C)]
struct Node<V> {
    next: Atomic<Node<V>>,
    val: Atomic<V>,
    key: [u8; MAX_KEY_LEN],
}

impl<V> Node<V> {
    fn boxed(key: &[u8], val: *mut V) -> *mut Self {
        let mut block = [0u8; MAX_KEY_LEN];
        block[..key.len()].copy_from_slice(key);
        Box::into_raw(Box::new(Node {
            next: Atomic::null(),
            val: Atomic::new(val),
            key: block,
        }))
    }

    #[inline]
    fn key_matches(&self, key: &[u8]) -> bool {
        self.key[..key.len()] == *key
    }
}

impl<V> Drop for Node<V> {
    /// A node being dropped is unreachable; if it still carries a value
    /// pointer, the node owns it. This covers the race where a replacement
    /// swaps a value into a node that a concurrent delete has already
    /// emptied and unlinked: the stray value goes when the node goes.
    fn drop(&mut self) {
        // SAFETY: exclusive access (`&mut self`).
        let val = unsafe { self.val.load_unprotected(Ordering::Relaxed) };
        if !val.is_null() {
            // SAFETY: value pointers are only ever produced by
            // `Box::into_raw`, and ownership of a still-referenced value
            // rests with the node.
            unsafe { drop(Box::from_raw(val)) };
        }
    }
}

/// A lock-free concurrent hash map with fixed-size byte keys.
///
/// Keys are byte blocks of exactly the length configured at construction,
/// copied into the node and compared by byte equality. Values are heap
/// allocations the map stores by pointer and never inspects. The bucket
/// count, key length and worker-slot count are fixed for the map's
/// lifetime.
///
/// Chains are mutated only by compare-and-swap, so writers never block each
/// other — they retry. Memory safety under concurrent unlinking comes from
/// the embedded [`Reclaimer`]: every operation runs under [`ByteMap::pin`]
/// on the calling thread's slot, unlinked nodes and superseded values are
/// retired rather than freed, and a periodic [`ByteMap::sweep`] frees them
/// once every slot has been observed idle.
///
/// # Example
///
/// ```
/// use petek_map::ByteMap;
///
/// // 64 buckets, 4-byte keys, 2 worker slots.
/// let map: ByteMap<u64> = ByteMap::new(64, 4, 2);
///
/// let guard = map.pin(0);
/// map.put_and_free(b"k001", Box::new(7), &guard);
/// assert_eq!(map.get(b"k001", &guard), Some(&7));
/// drop(guard);
///
/// map.sweep();
/// ```
pub struct ByteMap<V, S = FixedState> {
    buckets: Box<[Atomic<Node<V>>]>,
    key_len: usize,
    hasher: S,
    reclaimer: Reclaimer,
}

impl<V> ByteMap<V, FixedState>
where
    V: Send + Sync + 'static,
{
    /// Create a map with the default hasher (foldhash, fixed seed).
    ///
    /// # Panics
    ///
    /// See [`ByteMap::with_hasher`].
    pub fn new(buckets: usize, key_len: usize, slots: usize) -> Self {
        Self::with_hasher(buckets, key_len, slots, FixedState::default())
    }
}

impl<V, S> ByteMap<V, S>
where
    V: Send + Sync + 'static,
    S: BuildHasher,
{
    /// Create a map with a caller-supplied hasher.
    ///
    /// `buckets` fixes the bucket array length, `key_len` the exact byte
    /// length of every key, and `slots` the number of worker slots (one per
    /// maximum concurrent caller). The hasher must be deterministic for the
    /// map's lifetime; it sees exactly the `key_len` bytes of each key.
    ///
    /// # Panics
    ///
    /// Panics if `buckets`, `key_len` or `slots` is zero, or if `key_len`
    /// exceeds [`MAX_KEY_LEN`].
    pub fn with_hasher(buckets: usize, key_len: usize, slots: usize, hasher: S) -> Self {
        assert!(buckets > 0, "bucket count must be positive");
        assert!(
            key_len > 0 && key_len <= MAX_KEY_LEN,
            "key_len must be in 1..={MAX_KEY_LEN}"
        );
        let mut heads = Vec::with_capacity(buckets);
        for _ in 0..buckets {
            heads.push(Atomic::null());
        }
        Self {
            buckets: heads.into_boxed_slice(),
            key_len,
            hasher,
            reclaimer: Reclaimer::new(slots),
        }
    }

    /// The fixed bucket count.
    #[inline]
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// The fixed key length in bytes.
    #[inline]
    pub fn key_len(&self) -> usize {
        self.key_len
    }

    /// The fixed worker-slot count.
    #[inline]
    pub fn slot_count(&self) -> usize {
        self.reclaimer.slot_count()
    }

    /// Open a critical section on the calling thread's slot.
    ///
    /// Every `get`/`put`/`delete` must run under a guard, and nothing those
    /// operations return may outlive it. Each concurrent thread must use its
    /// own fixed slot index.
    #[inline]
    pub fn pin(&self, slot: usize) -> Guard<'_> {
        self.reclaimer.pin(slot)
    }

    /// Establish quiescence and free everything retired so far.
    ///
    /// Call periodically from a thread that holds no guard on this map;
    /// calling it with a guard held on the current thread deadlocks.
    pub fn sweep(&self) {
        self.reclaimer.sweep();
    }

    /// Chain head for `key`, checking the key length.
    #[inline]
    fn chain(&self, key: &[u8]) -> &Atomic<Node<V>> {
        assert_eq!(key.len(), self.key_len, "key length mismatch");
        let hash = self.hasher.hash_one(key);
        &self.buckets[(hash as usize) % self.buckets.len()]
    }

    /// Look up `key`, lending the value until the guard drops.
    ///
    /// Lock-free linear scan of one chain. Racing mutators may make the
    /// result stale by the time the caller reads it; a value once installed
    /// and not yet unlinked is always visible.
    pub fn get<'g>(&self, key: &[u8], guard: &'g Guard<'_>) -> Option<&'g V> {
        let chain = self.chain(key);
        let mut curr = chain.load(Ordering::Acquire, guard);
        while !curr.is_null() {
            // SAFETY: loaded under the guard; unlinked nodes are retired,
            // not freed, so the node outlives this critical section.
            let node = unsafe { curr.deref() };
            if node.key_matches(key) {
                let val = node.val.load(Ordering::Acquire, guard);
                // SAFETY: same argument as the node itself — superseded
                // values are retired through the reclaimer, which cannot
                // drop them while this slot is pinned.
                return unsafe { val.as_ref() };
            }
            curr = node.next.load(Ordering::Acquire, guard);
        }
        None
    }

    /// Insert `val` under `key`, or replace the value of an existing entry.
    ///
    /// Returns the previous value handle if a replacement occurred, valid
    /// until the guard drops. Reclaiming it is the caller's business: hand
    /// it to [`ByteMap::retire_value`], or take ownership with
    /// [`Shared::into_owned`] once quiescent. Use
    /// [`ByteMap::put_and_free`] to let the map dispose of it.
    ///
    /// A replacement swaps the value pointer of the existing node; it never
    /// produces a second node for the key. Concurrent puts of the same key
    /// serialize through the swap and the chain CAS: one value survives,
    /// none are dropped on the floor.
    pub fn put<'g>(&self, key: &[u8], val: Box<V>, guard: &'g Guard<'_>) -> Option<Shared<'g, V>> {
        let chain = self.chain(key);
        let val = Box::into_raw(val);
        // Allocated up front, exactly once per call; discarded if the key
        // turns out to exist.
        let node = Node::boxed(key, val);
        let backoff = Backoff::new();

        loop {
            let head = chain.load(Ordering::Acquire, guard);

            if head.is_null() {
                match chain.compare_exchange(
                    Shared::null(),
                    // SAFETY: fresh allocation, valid for the map's lifetime.
                    unsafe { Shared::from_raw(node) },
                    Ordering::Release,
                    Ordering::Relaxed,
                    guard,
                ) {
                    Ok(_) => return None,
                    Err(_) => {
                        backoff.spin();
                        continue;
                    }
                }
            }

            // Scan for a key match, remembering the tail as we go.
            let mut curr = head;
            let tail = loop {
                // SAFETY: loaded under the guard; see `get`.
                let n = unsafe { curr.deref() };
                if n.key_matches(key) {
                    // SAFETY: `val` stays valid for the map's lifetime once
                    // installed; the swap publishes it.
                    let prev = n.val.swap(unsafe { Shared::from_raw(val) }, Ordering::AcqRel, guard);
                    // The fresh node still references `val`; clear it so
                    // the node's drop glue leaves the installed value alone.
                    // SAFETY: never published; this call owns the node.
                    unsafe {
                        (*node).val.store(Shared::null(), Ordering::Relaxed);
                        drop(Box::from_raw(node));
                    }
                    return (!prev.is_null()).then_some(prev);
                }
                let next = n.next.load(Ordering::Acquire, guard);
                if next.is_null() {
                    break n;
                }
                curr = next;
            };

            // No match: append at the tail. A concurrent append changes the
            // tail's next from null and fails this CAS; re-scan from the
            // head, which may also have changed.
            match tail.next.compare_exchange(
                Shared::null(),
                // SAFETY: fresh allocation, valid for the map's lifetime.
                unsafe { Shared::from_raw(node) },
                Ordering::Release,
                Ordering::Relaxed,
                guard,
            ) {
                Ok(_) => return None,
                Err(_) => {
                    backoff.spin();
                    continue;
                }
            }
        }
    }

    /// [`ByteMap::put`], with any superseded value retired to the map.
    ///
    /// The map takes ownership of the previous value and frees it on a
    /// later sweep; the caller never sees it.
    pub fn put_and_free(&self, key: &[u8], val: Box<V>, guard: &Guard<'_>) {
        if let Some(prev) = self.put(key, val, guard) {
            // SAFETY: `put` hands out each superseded value exactly once,
            // and this call consumes that one handle.
            unsafe { self.retire_value(prev) };
        }
    }

    /// Remove `key`, returning its value handle.
    ///
    /// The unlinked node itself is always retired to the map — the map owns
    /// its node structs. The value is returned guard-scoped, exactly like a
    /// [`ByteMap::put`] replacement; use [`ByteMap::delete_and_free`] to
    /// have the map dispose of it too.
    pub fn delete<'g>(&self, key: &[u8], guard: &'g Guard<'_>) -> Option<Shared<'g, V>> {
        let chain = self.chain(key);
        let backoff = Backoff::new();

        loop {
            // Scan for the key, tracking the link that points at it.
            let mut prev_link = chain;
            let mut curr = prev_link.load(Ordering::Acquire, guard);
            while !curr.is_null() {
                // SAFETY: loaded under the guard; see `get`.
                let n = unsafe { curr.deref() };
                if n.key_matches(key) {
                    break;
                }
                prev_link = &n.next;
                curr = n.next.load(Ordering::Acquire, guard);
            }

            if curr.is_null() {
                return None;
            }

            // SAFETY: loaded under the guard; see `get`.
            let n = unsafe { curr.deref() };
            let next = n.next.load(Ordering::Acquire, guard);
            match prev_link.compare_exchange(curr, next, Ordering::Release, Ordering::Relaxed, guard)
            {
                Ok(_) => {
                    // Take the value with a swap, not a load: a racing
                    // replacement swaps on the same word, and the two RMWs
                    // serialize — each handle is handed out exactly once,
                    // so no value can be retired twice.
                    let val = n.val.swap(Shared::null(), Ordering::AcqRel, guard);
                    // SAFETY: the node just became unreachable from the
                    // chain and is retired exactly once, here.
                    self.reclaimer
                        .retire(unsafe { Retired::from_raw(curr.as_raw()) });
                    return (!val.is_null()).then_some(val);
                }
                Err(_) => {
                    // The chain changed under us; re-scan from the head.
                    backoff.spin();
                    continue;
                }
            }
        }
    }

    /// [`ByteMap::delete`], with the value retired to the map as well.
    ///
    /// Returns whether a value was removed.
    pub fn delete_and_free(&self, key: &[u8], guard: &Guard<'_>) -> bool {
        match self.delete(key, guard) {
            Some(val) => {
                // SAFETY: `delete` hands out each removed value exactly
                // once, and this call consumes that one handle.
                unsafe { self.retire_value(val) };
                true
            }
            None => false,
        }
    }

    /// Hand a value handle returned by [`ByteMap::put`] or
    /// [`ByteMap::delete`] back to the map for deferred freeing.
    ///
    /// # Safety
    ///
    /// `val` must be a handle returned by `put` or `delete` on *this* map,
    /// retired at most once, and no copy of it may be dereferenced after
    /// the current critical section ends.
    pub unsafe fn retire_value(&self, val: Shared<'_, V>) {
        // SAFETY: per the contract above, plus `put` only ever stores
        // pointers produced by `Box::into_raw`.
        self.reclaimer
            .retire(unsafe { Retired::from_raw(val.as_raw()) });
    }

    /// Iterate every entry, bucket by bucket, chain order within a bucket.
    ///
    /// No snapshot semantics: entries inserted or removed while iterating
    /// may or may not be observed, consistent with some interleaving of the
    /// concurrent operations.
    pub fn iter<'g>(&'g self, _guard: &'g Guard<'_>) -> Iter<'g, V> {
        Iter {
            buckets: &self.buckets,
            key_len: self.key_len,
            index: 0,
            curr: core::ptr::null_mut(),
            _guard: PhantomData,
        }
    }
}

impl<V, S> Drop for ByteMap<V, S> {
    /// Teardown releases every chain, then forces one reclamation pass.
    ///
    /// Exclusive access is guaranteed by `&mut self`, so raw walks are fine
    /// here: no concurrent accessor can exist.
    fn drop(&mut self) {
        for head in self.buckets.iter() {
            // SAFETY: exclusive access; nothing can be reclaimed under us.
            let mut curr = unsafe { head.load_unprotected(Ordering::Relaxed) };
            while !curr.is_null() {
                // SAFETY: nodes are uniquely owned by the chain, allocated
                // via Box::into_raw in `Node::boxed`. The node's drop glue
                // frees its value.
                let node = unsafe { Box::from_raw(curr) };
                // SAFETY: exclusive access, as above.
                curr = unsafe { node.next.load_unprotected(Ordering::Relaxed) };
            }
        }
        self.reclaimer.sweep();
    }
}

/// Iterator over a [`ByteMap`], created by [`ByteMap::iter`].
///
/// Yields `(key, value)` pairs lent for the guard's lifetime.
pub struct Iter<'g, V> {
    buckets: &'g [Atomic<Node<V>>],
    key_len: usize,
    index: usize,
    curr: *mut Node<V>,
    _guard: PhantomData<&'g ()>,
}

impl<'g, V> Iterator for Iter<'g, V> {
    type Item = (&'g [u8], &'g V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            while self.curr.is_null() {
                if self.index == self.buckets.len() {
                    return None;
                }
                // SAFETY: `ByteMap::iter` borrowed a live guard for 'g, so
                // the chain cannot be reclaimed while this iterator exists.
                self.curr = unsafe { self.buckets[self.index].load_unprotected(Ordering::Acquire) };
                self.index += 1;
            }
            // SAFETY: as above — the guard borrow keeps the node alive for 'g.
            let node: &'g Node<V> = unsafe { &*self.curr };
            // SAFETY: as above.
            self.curr = unsafe { node.next.load_unprotected(Ordering::Acquire) };
            // SAFETY: as above.
            let val = unsafe { node.val.load_unprotected(Ordering::Acquire) };
            if val.is_null() {
                // A concurrent delete emptied the node before unlinking it.
                continue;
            }
            // SAFETY: non-null, and retirement is deferred past 'g.
            return Some((&node.key[..self.key_len], unsafe { &*val }));
        }
    }
}
