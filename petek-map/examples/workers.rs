//! Example: worker threads sharing a ByteMap while a sweeper reclaims.
//!
//! Each worker owns one slot and brackets every operation with a pin on it;
//! the sweeper periodically establishes quiescence and frees whatever the
//! workers retired.

use petek_map::ByteMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Instant;

const WORKERS: usize = 4;
const OPS_PER_WORKER: usize = 100_000;
const KEY_SPACE: u64 = 1024;

fn main() {
    println!("=== petek-map worker/sweeper demo ===\n");

    let map: Arc<ByteMap<u64>> = Arc::new(ByteMap::new(4096, 8, WORKERS));
    let done = Arc::new(AtomicBool::new(false));

    let sweeper = {
        let map = Arc::clone(&map);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut sweeps = 0u64;
            while !done.load(Ordering::SeqCst) {
                map.sweep();
                sweeps += 1;
                thread::yield_now();
            }
            sweeps
        })
    };

    let start = Instant::now();
    let mut handles = Vec::new();
    for slot in 0..WORKERS {
        let map = Arc::clone(&map);
        handles.push(thread::spawn(move || {
            for i in 0..OPS_PER_WORKER {
                let key = ((i as u64 * 31 + slot as u64) % KEY_SPACE).to_be_bytes();
                let guard = map.pin(slot);
                match i % 4 {
                    0 => {
                        map.delete_and_free(&key, &guard);
                    }
                    _ => {
                        map.put_and_free(&key, Box::new(i as u64), &guard);
                    }
                }
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }
    let duration = start.elapsed();
    done.store(true, Ordering::SeqCst);
    let sweeps = sweeper.join().unwrap();

    let total_ops = WORKERS * OPS_PER_WORKER;
    println!(
        "{} operations from {} workers in {:?} ({:.0} ops/sec)",
        total_ops,
        WORKERS,
        duration,
        total_ops as f64 / duration.as_secs_f64()
    );
    println!("sweeper completed {} quiescence cycles", sweeps);

    let guard = map.pin(0);
    println!("{} entries live at the end", map.iter(&guard).count());
}
