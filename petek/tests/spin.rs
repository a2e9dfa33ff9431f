use petek::Spinlock;
use std::cell::UnsafeCell;
use std::sync::Arc;
use std::thread;

#[test]
fn try_lock_fails_while_held() {
    let lock = Spinlock::new();
    let guard = lock.lock();
    assert!(lock.try_lock().is_none());
    drop(guard);
    assert!(lock.try_lock().is_some());
}

#[test]
fn guard_releases_on_drop() {
    let lock = Spinlock::new();
    drop(lock.lock());
    assert!(!lock.is_locked());
    drop(lock.try_lock().unwrap());
    assert!(!lock.is_locked());
}

struct Counter(UnsafeCell<u64>);

// SAFETY: every access in the test happens under the lock.
unsafe impl Sync for Counter {}

#[test]
#[cfg_attr(miri, ignore)]
fn mutual_exclusion_under_contention() {
    const THREADS: u64 = 8;
    const INCREMENTS: u64 = 10_000;

    let lock = Arc::new(Spinlock::new());
    let counter = Arc::new(Counter(UnsafeCell::new(0)));

    let mut handles = vec![];
    for _ in 0..THREADS {
        let lock = lock.clone();
        let counter = counter.clone();
        handles.push(thread::spawn(move || {
            for _ in 0..INCREMENTS {
                let _guard = lock.lock();
                // SAFETY: the lock serializes these accesses.
                unsafe {
                    *counter.0.get() += 1;
                }
            }
        }));
    }

    for h in handles {
        h.join().unwrap();
    }

    let _guard = lock.lock();
    // SAFETY: all writers have joined, and we hold the lock.
    assert_eq!(unsafe { *counter.0.get() }, THREADS * INCREMENTS);
}
