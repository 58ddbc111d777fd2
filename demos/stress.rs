//! Hammers one lock from several threads and reports which paths they took.
//!
//! Run with `RUST_LOG=info cargo run --example stress --features log`, or
//! `RUST_LOG=trace` to also see every sleep and wake.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering::Relaxed};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use futexlock::raw::spins::RawMutex;

const THREADS: usize = 8;
const DURATION: Duration = Duration::from_secs(2);

#[derive(Default)]
struct Counters {
    locked_fast: AtomicU64,
    locked_slow: AtomicU64,
    peeked_locked: AtomicU64,
    peeked_unlocked: AtomicU64,
    waited_fast: AtomicU64,
    waited_slow: AtomicU64,
}

fn worker(id: usize, lock: &RawMutex, counters: &Counters, inside: &AtomicBool, stop: &AtomicBool) {
    let mut round = 0_usize;
    while !stop.load(Relaxed) {
        round += 1;
        // Every other thread peeks first and waits out the lock instead of
        // queueing on it, the way a lock-eliding caller would.
        if id % 2 == 1 {
            if lock.is_locked() {
                counters.peeked_locked.fetch_add(1, Relaxed);
                let waited = if lock.wait_quiescent().is_slow() {
                    &counters.waited_slow
                } else {
                    &counters.waited_fast
                };
                waited.fetch_add(1, Relaxed);
                continue;
            }
            counters.peeked_unlocked.fetch_add(1, Relaxed);
        }

        let locked = if lock.lock().is_slow() { &counters.locked_slow } else { &counters.locked_fast };
        locked.fetch_add(1, Relaxed);
        assert!(!inside.swap(true, Relaxed), "two threads inside the critical section");
        if round % 128 == 0 {
            thread::sleep(Duration::from_micros(100));
        }
        inside.store(false, Relaxed);
        // SAFETY: locked just above.
        unsafe { lock.unlock() };
    }
}

fn main() {
    env_logger::init();

    let lock = Arc::new(RawMutex::new());
    let counters = Arc::new(Counters::default());
    let inside = Arc::new(AtomicBool::new(false));
    let stop = Arc::new(AtomicBool::new(false));

    log::info!("running {THREADS} threads for {DURATION:?}");
    let start = Instant::now();
    let handles: Vec<_> = (0..THREADS)
        .map(|id| {
            let (lock, counters) = (lock.clone(), counters.clone());
            let (inside, stop) = (inside.clone(), stop.clone());
            thread::spawn(move || worker(id, &lock, &counters, &inside, &stop))
        })
        .collect();

    thread::sleep(DURATION);
    stop.store(true, Relaxed);
    for handle in handles {
        if handle.join().is_err() {
            log::error!("a worker panicked");
            std::process::exit(1);
        }
    }
    let elapsed = start.elapsed();
    if elapsed > DURATION * 2 {
        log::warn!("workers took {elapsed:?} to stop");
    }

    log::info!(
        "locked fast: {}, locked slow: {}",
        counters.locked_fast.load(Relaxed),
        counters.locked_slow.load(Relaxed)
    );
    log::info!(
        "peeked locked: {}, peeked unlocked: {}",
        counters.peeked_locked.load(Relaxed),
        counters.peeked_unlocked.load(Relaxed)
    );
    log::info!(
        "waited fast: {}, waited slow: {}",
        counters.waited_fast.load(Relaxed),
        counters.waited_slow.load(Relaxed)
    );
    log::info!("final state: {:?}", lock);
}
