use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{channel, RecvTimeoutError};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

use futexlock::raw::{spins::RawMutex, Path};
use futexlock::Mutex;

const HOLD: Duration = Duration::from_millis(100);
const DURATION: Duration = Duration::from_millis(500);

/// Waits for every handle to report through `rx`, failing if any of them
/// takes longer than `timeout` in total.
fn join_within(rx: &std::sync::mpsc::Receiver<()>, count: usize, timeout: Duration) {
    let deadline = Instant::now() + timeout;
    for _ in 0..count {
        let left = deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(left) {
            Ok(()) => {}
            Err(RecvTimeoutError::Timeout) => panic!("a thread hung for longer than {timeout:?}"),
            Err(RecvTimeoutError::Disconnected) => panic!("a thread panicked"),
        }
    }
}

#[test]
fn critical_sections_are_serialized() {
    let mutex = Arc::new(Mutex::new(Vec::new()));
    let start = Instant::now();
    let handles: Vec<_> = (0..3)
        .map(|_| {
            let mutex = Arc::clone(&mutex);
            thread::spawn(move || {
                let mut log = mutex.lock();
                let enter = start.elapsed();
                thread::sleep(HOLD);
                let exit = start.elapsed();
                log.push((enter, exit));
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert!(start.elapsed() >= HOLD * 3);

    let mut log = Arc::try_unwrap(mutex).unwrap().into_inner();
    assert_eq!(log.len(), 3);
    log.sort();
    for pair in log.windows(2) {
        let (_, exit) = pair[0];
        let (enter, _) = pair[1];
        assert!(exit <= enter, "critical sections overlap: {pair:?}");
    }
}

#[test]
fn mixed_stress_never_hangs() {
    const THREADS: usize = 8;

    let lock = Arc::new(RawMutex::new());
    let inside = Arc::new(AtomicBool::new(false));
    let stop = Arc::new(AtomicBool::new(false));
    let slow = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(THREADS));
    let (tx, rx) = channel();

    for id in 0..THREADS {
        let (lock, inside, stop) = (lock.clone(), inside.clone(), stop.clone());
        let (slow, barrier, tx) = (slow.clone(), barrier.clone(), tx.clone());
        thread::spawn(move || {
            barrier.wait();
            let mut round = 0_usize;
            while !stop.load(Ordering::Relaxed) {
                round += 1;
                if lock.is_locked() && (id + round) % 3 == 0 {
                    if lock.wait_quiescent().is_slow() {
                        slow.fetch_add(1, Ordering::Relaxed);
                    }
                    continue;
                }
                if lock.lock().is_slow() {
                    slow.fetch_add(1, Ordering::Relaxed);
                }
                assert!(!inside.swap(true, Ordering::Relaxed));
                if round % 64 == 0 {
                    thread::sleep(Duration::from_micros(50));
                }
                inside.store(false, Ordering::Relaxed);
                // SAFETY: locked just above.
                unsafe { lock.unlock() };
            }
            tx.send(()).unwrap();
        });
    }
    drop(tx);

    thread::sleep(DURATION);
    stop.store(true, Ordering::Relaxed);
    join_within(&rx, THREADS, DURATION * 2);

    assert!(!lock.is_locked());
    assert_eq!(lock.contenders(), 0);
}

#[test]
fn quiescent_waiter_keeps_returning() {
    const ROUNDS: usize = 20;

    let lock = Arc::new(RawMutex::new());
    let stop = Arc::new(AtomicBool::new(false));
    let returns = Arc::new(AtomicUsize::new(0));
    let (tx, rx) = channel();

    let locker = {
        let (lock, stop) = (lock.clone(), stop.clone());
        thread::spawn(move || {
            for _ in 0..ROUNDS {
                lock.lock();
                thread::sleep(Duration::from_millis(5));
                // SAFETY: locked just above.
                unsafe { lock.unlock() };
                thread::sleep(Duration::from_millis(1));
            }
            stop.store(true, Ordering::Relaxed);
        })
    };
    {
        let (lock, stop, returns) = (lock.clone(), stop.clone(), returns.clone());
        thread::spawn(move || {
            while !stop.load(Ordering::Relaxed) {
                lock.wait_quiescent();
                returns.fetch_add(1, Ordering::Relaxed);
                thread::yield_now();
            }
            tx.send(()).unwrap();
        });
    }

    locker.join().unwrap();
    join_within(&rx, 1, Duration::from_secs(5));
    assert!(returns.load(Ordering::Relaxed) > 0);
}

#[test]
fn waiter_on_long_hold_sleeps_until_release() {
    const WAITERS: usize = 4;

    let lock = Arc::new(RawMutex::new());
    let started = Arc::new(Barrier::new(WAITERS + 1));
    let (tx, rx) = channel();
    lock.lock();

    let waiters: Vec<_> = (0..WAITERS)
        .map(|_| {
            let (lock, started, tx) = (lock.clone(), started.clone(), tx.clone());
            thread::spawn(move || {
                started.wait();
                let path = lock.wait_quiescent();
                tx.send(()).unwrap();
                path
            })
        })
        .collect();
    // Every waiter is running before the hold starts, and the hold outlasts
    // any spin phase by orders of magnitude.
    started.wait();
    assert_eq!(rx.recv_timeout(HOLD), Err(RecvTimeoutError::Timeout));

    // SAFETY: locked at the start of this test.
    unsafe { lock.unlock() };
    join_within(&rx, waiters.len(), Duration::from_secs(5));
    for waiter in waiters {
        assert_eq!(waiter.join().unwrap(), Path::Slow);
    }
    assert!(!lock.is_locked());
}

#[test]
fn state_drains_after_contention() {
    let mutex = Arc::new(Mutex::new(0_u64));
    let handles: Vec<_> = (0..6)
        .map(|_| {
            let mutex = Arc::clone(&mutex);
            thread::spawn(move || {
                for _ in 0..500 {
                    *mutex.lock() += 1;
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert!(!mutex.is_locked());
    assert_eq!(mutex.wait_quiescent(), Path::Fast);
    assert_eq!(*mutex.lock(), 3000);
}
