/// The wait and wake operations of a futex channel keyed by an atomic word.
///
/// Currently, this crate leverages `atomic_wait`'s API for the OS facility,
/// which provides unified, cross platform wait and wake functionality: the
/// private futex operations on Linux, `WaitOnAddress` on Windows and
/// `__ulock` on macOS. Should we choose to talk to the kernel directly in
/// the future, each implementation must keep this same contract.
pub trait Futex {
    /// Blocks the current thread unless or until the word no longer holds
    /// `expected`.
    ///
    /// The comparison and the sleep happen atomically with respect to
    /// [`wake_one`] and [`wake_all`] on the same word. This function may
    /// return spuriously, so callers must always re-check the word.
    ///
    /// [`wake_one`]: Futex::wake_one
    /// [`wake_all`]: Futex::wake_all
    fn wait_if_equal(&self, expected: u32);

    /// Wakes at most one thread blocked on this word.
    fn wake_one(&self);

    /// Wakes every thread blocked on this word.
    fn wake_all(&self);
}

#[cfg(not(all(loom, test)))]
impl Futex for core::sync::atomic::AtomicU32 {
    #[inline]
    fn wait_if_equal(&self, expected: u32) {
        atomic_wait::wait(self, expected);
    }

    #[inline]
    fn wake_one(&self) {
        atomic_wait::wake_one(self);
    }

    #[inline]
    fn wake_all(&self) {
        atomic_wait::wake_all(self);
    }
}

// Loom cannot block a modelled thread on a kernel address, so waiting yields
// until the word changes. A thread whose wake-up was lost never returns, and
// Loom reports the livelock.
#[cfg(all(loom, test))]
#[cfg(not(tarpaulin_include))]
impl Futex for loom::sync::atomic::AtomicU32 {
    fn wait_if_equal(&self, expected: u32) {
        use core::sync::atomic::Ordering::Acquire;
        while self.load(Acquire) == expected {
            loom::thread::yield_now();
        }
    }

    fn wake_one(&self) {
        loom::thread::yield_now();
    }

    fn wake_all(&self) {
        loom::thread::yield_now();
    }
}

#[cfg(all(not(loom), test))]
mod test {
    use std::sync::atomic::AtomicU32;
    use std::sync::atomic::Ordering::{Acquire, Release};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use super::Futex;

    #[test]
    fn wait_returns_immediately_on_changed_value() {
        let word = AtomicU32::new(3);
        // Expected value differs from the current one: must not block.
        word.wait_if_equal(1);
        assert_eq!(word.load(Acquire), 3);
    }

    #[test]
    fn wake_one_releases_a_waiter() {
        let word = Arc::new(AtomicU32::new(1));
        let waiter = {
            let word = Arc::clone(&word);
            thread::spawn(move || {
                while word.load(Acquire) == 1 {
                    word.wait_if_equal(1);
                }
            })
        };
        thread::sleep(Duration::from_millis(20));
        word.store(0, Release);
        word.wake_one();
        waiter.join().unwrap();
    }

    #[test]
    fn wake_all_releases_every_waiter() {
        let word = Arc::new(AtomicU32::new(1));
        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let word = Arc::clone(&word);
                thread::spawn(move || {
                    while word.load(Acquire) == 1 {
                        word.wait_if_equal(1);
                    }
                })
            })
            .collect();
        thread::sleep(Duration::from_millis(20));
        word.store(0, Release);
        word.wake_all();
        for waiter in waiters {
            waiter.join().unwrap();
        }
    }

    #[test]
    fn wakes_without_waiters_are_harmless() {
        let word = AtomicU32::new(0);
        word.wake_one();
        word.wake_all();
        assert_eq!(word.load(Acquire), 0);
    }
}
