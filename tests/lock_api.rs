// Test suite from the Rust's Mutex implementation with minor modifications
// since the API is not compatible with this crate implementation and some
// new tests as well.
//
// Copyright 2014 The Rust Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

#![cfg(feature = "lock_api")]

use std::sync::mpsc::channel;
use std::sync::Arc;
use std::thread;

use futexlock::lock_api::spins::Mutex;
use futexlock::lock_api::wait_quiescent;
use futexlock::raw::Path;

#[test]
fn smoke() {
    let m = Mutex::new(());
    drop(m.lock());
    drop(m.lock());
}

#[test]
fn lots_and_lots() {
    static LOCK: Mutex<u32> = Mutex::new(0);

    const ITERS: u32 = 1000;
    const CONCURRENCY: u32 = 3;

    fn inc() {
        for _ in 0..ITERS {
            let mut g = LOCK.lock();
            *g += 1;
        }
    }

    let (tx, rx) = channel();
    for _ in 0..2 * CONCURRENCY {
        let tx2 = tx.clone();
        thread::spawn(move || {
            inc();
            tx2.send(()).unwrap();
        });
    }

    drop(tx);
    for _ in 0..2 * CONCURRENCY {
        rx.recv().unwrap();
    }
    assert_eq!(*LOCK.lock(), ITERS * CONCURRENCY * 2);
}

#[test]
fn try_lock() {
    let m = Mutex::new(());
    let g = m.try_lock().unwrap();
    assert!(m.try_lock().is_none());
    drop(g);
    assert!(!m.is_locked());
}

#[test]
fn quiescent_wait_through_lock_api() {
    let m = Arc::new(Mutex::new(0));
    assert_eq!(wait_quiescent(&*m), Path::Fast);

    let guard = m.lock();
    let c_m = Arc::clone(&m);
    let waiter = thread::spawn(move || {
        wait_quiescent(&*c_m);
        *c_m.lock()
    });
    thread::sleep(std::time::Duration::from_millis(20));
    drop(guard);
    assert_eq!(waiter.join().unwrap(), 0);
}

#[test]
fn test_lock_unsized() {
    let lock: &Mutex<[i32]> = &Mutex::new([1, 2, 3]);
    {
        let b = &mut *lock.lock();
        b[0] = 4;
        b[2] = 5;
    }
    let comp: &[i32] = &[4, 2, 5];
    assert_eq!(&*lock.lock(), comp);
}
