use petek_map::{ByteMap, MAX_KEY_LEN};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

struct Tracked(Arc<AtomicUsize>);

impl Drop for Tracked {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn put_then_get() {
    let map: ByteMap<u64> = ByteMap::new(16, 4, 1);
    let guard = map.pin(0);

    assert!(map.put(b"aaaa", Box::new(1), &guard).is_none());
    assert_eq!(map.get(b"aaaa", &guard), Some(&1));
    assert_eq!(map.get(b"bbbb", &guard), None);
}

#[test]
fn put_replaces_and_returns_previous() {
    let map: ByteMap<u64> = ByteMap::new(16, 4, 1);
    let guard = map.pin(0);

    assert!(map.put(b"aaaa", Box::new(1), &guard).is_none());
    let prev = map.put(b"aaaa", Box::new(2), &guard).expect("previous value");
    // SAFETY: single-threaded test, no other reader can hold the handle.
    assert_eq!(*unsafe { prev.into_owned() }, 1);
    assert_eq!(map.get(b"aaaa", &guard), Some(&2));

    // Still exactly one entry for the key.
    assert_eq!(map.iter(&guard).count(), 1);
}

#[test]
fn delete_absent_returns_none() {
    let map: ByteMap<u64> = ByteMap::new(16, 4, 1);
    let guard = map.pin(0);

    map.put_and_free(b"aaaa", Box::new(1), &guard);
    assert!(map.delete(b"bbbb", &guard).is_none());
    assert_eq!(map.iter(&guard).count(), 1);
}

#[test]
fn delete_removes_exactly_one_entry() {
    let map: ByteMap<u64> = ByteMap::new(16, 4, 1);
    let guard = map.pin(0);

    map.put_and_free(b"aaaa", Box::new(1), &guard);
    map.put_and_free(b"bbbb", Box::new(2), &guard);
    assert_eq!(map.iter(&guard).count(), 2);

    let removed = map.delete(b"aaaa", &guard).expect("value");
    // SAFETY: single-threaded test, no other reader can hold the handle.
    assert_eq!(*unsafe { removed.into_owned() }, 1);

    assert_eq!(map.get(b"aaaa", &guard), None);
    assert_eq!(map.get(b"bbbb", &guard), Some(&2));
    assert_eq!(map.iter(&guard).count(), 1);
}

#[test]
fn delete_and_free_reports_presence() {
    let map: ByteMap<u64> = ByteMap::new(16, 4, 2);
    let guard = map.pin(0);

    map.put_and_free(b"aaaa", Box::new(1), &guard);
    assert!(map.delete_and_free(b"aaaa", &guard));
    assert!(!map.delete_and_free(b"aaaa", &guard));
    assert_eq!(map.get(b"aaaa", &guard), None);
}

#[test]
fn single_bucket_chains_work() {
    // Every key lands in the same chain.
    let map: ByteMap<u64> = ByteMap::new(1, 4, 1);
    let guard = map.pin(0);

    for i in 0..8u32 {
        map.put_and_free(&i.to_be_bytes(), Box::new(u64::from(i) * 10), &guard);
    }
    for i in 0..8u32 {
        assert_eq!(map.get(&i.to_be_bytes(), &guard), Some(&(u64::from(i) * 10)));
    }

    // Unlink from the middle and both ends of the chain.
    assert!(map.delete_and_free(&3u32.to_be_bytes(), &guard));
    assert!(map.delete_and_free(&0u32.to_be_bytes(), &guard));
    assert!(map.delete_and_free(&7u32.to_be_bytes(), &guard));

    assert_eq!(map.iter(&guard).count(), 5);
    for i in [1u32, 2, 4, 5, 6] {
        assert_eq!(map.get(&i.to_be_bytes(), &guard), Some(&(u64::from(i) * 10)));
    }
}

#[test]
fn iter_visits_every_entry_once() {
    let map: ByteMap<u64> = ByteMap::new(8, 4, 1);
    let guard = map.pin(0);

    for i in 0..100u32 {
        map.put_and_free(&i.to_be_bytes(), Box::new(u64::from(i)), &guard);
    }

    let mut seen = std::collections::HashSet::new();
    for (key, val) in map.iter(&guard) {
        let i = u32::from_be_bytes(key.try_into().unwrap());
        assert_eq!(*val, u64::from(i));
        assert!(seen.insert(i), "key yielded twice");
    }
    assert_eq!(seen.len(), 100);
}

#[test]
fn max_key_len_is_usable() {
    let map: ByteMap<u64> = ByteMap::new(4, MAX_KEY_LEN, 1);
    let guard = map.pin(0);

    let key = [0xabu8; MAX_KEY_LEN];
    map.put_and_free(&key, Box::new(9), &guard);
    assert_eq!(map.get(&key, &guard), Some(&9));
}

#[test]
fn configuration_accessors() {
    let map: ByteMap<u64> = ByteMap::new(32, 8, 3);
    assert_eq!(map.bucket_count(), 32);
    assert_eq!(map.key_len(), 8);
    assert_eq!(map.slot_count(), 3);
}

#[test]
fn drop_frees_live_values() {
    let drops = Arc::new(AtomicUsize::new(0));
    let map: ByteMap<Tracked> = ByteMap::new(8, 4, 1);

    {
        let guard = map.pin(0);
        for i in 0..20u32 {
            map.put_and_free(&i.to_be_bytes(), Box::new(Tracked(drops.clone())), &guard);
        }
    }

    assert_eq!(drops.load(Ordering::SeqCst), 0);
    drop(map);
    assert_eq!(drops.load(Ordering::SeqCst), 20);
}

#[test]
#[should_panic(expected = "key length mismatch")]
fn wrong_key_length_panics() {
    let map: ByteMap<u64> = ByteMap::new(16, 4, 1);
    let guard = map.pin(0);
    let _ = map.get(b"aaa", &guard);
}

#[test]
#[should_panic]
fn zero_buckets_panics() {
    let _: ByteMap<u64> = ByteMap::new(0, 4, 1);
}

#[test]
#[should_panic]
fn oversized_key_len_panics() {
    let _: ByteMap<u64> = ByteMap::new(16, MAX_KEY_LEN + 1, 1);
}

#[test]
#[should_panic]
fn zero_slots_panics() {
    let _: ByteMap<u64> = ByteMap::new(16, 4, 0);
}
