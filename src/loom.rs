pub mod models {
    use core::array;

    use loom::cell::UnsafeCell;
    use loom::sync::Arc;
    use loom::{model, thread};

    use crate::raw::RawMutex;
    use crate::relax::Relax;

    /// A raw lock and the counter it protects, checked by Loom for races.
    struct Shared<R> {
        lock: RawMutex<R>,
        count: UnsafeCell<u32>,
    }

    // SAFETY: `count` is only accessed while `lock` is held.
    unsafe impl<R> Sync for Shared<R> {}

    impl<R: Relax> Shared<R> {
        fn new() -> Self {
            Self { lock: RawMutex::new(), count: UnsafeCell::new(0) }
        }

        fn inc(&self) {
            self.lock.lock();
            self.count.with_mut(|count| unsafe { *count += 1 });
            // SAFETY: locked just above.
            unsafe { self.lock.unlock() };
        }

        fn try_inc(&self) {
            if self.lock.try_lock() {
                self.count.with_mut(|count| unsafe { *count += 1 });
                // SAFETY: `try_lock` succeeded.
                unsafe { self.lock.unlock() };
            }
        }

        fn get(&self) -> u32 {
            self.lock.lock();
            let count = self.count.with(|count| unsafe { *count });
            // SAFETY: locked just above.
            unsafe { self.lock.unlock() };
            count
        }

        /// The state word must drain back to zero once every thread joined.
        fn assert_drained(&self) {
            assert!(!self.lock.is_locked());
            assert_eq!(self.lock.contenders(), 0);
        }
    }

    // More threads make these models run for too long.
    const LOCKS: usize = 2;
    const TRY_LOCKS: usize = 3;

    /// Evaluates that concurrent `lock` calls serialize all mutations against
    /// the shared data, and that no contender is left registered.
    pub fn lock_join<R: Relax + 'static>() {
        model(|| {
            let shared = Arc::new(Shared::<R>::new());
            let handles: [_; LOCKS] = array::from_fn(|_| {
                let shared = Arc::clone(&shared);
                thread::spawn(move || shared.inc())
            });
            for handle in handles {
                handle.join().unwrap();
            }
            assert_eq!(shared.get(), LOCKS as u32);
            shared.assert_drained();
        });
    }

    /// Evaluates that concurrent `try_lock` calls serialize all mutations
    /// against the shared data.
    pub fn try_lock_join<R: Relax + 'static>() {
        model(|| {
            let shared = Arc::new(Shared::<R>::new());
            let handles: [_; TRY_LOCKS] = array::from_fn(|_| {
                let shared = Arc::clone(&shared);
                thread::spawn(move || shared.try_inc())
            });
            for handle in handles {
                handle.join().unwrap();
            }
            assert!((1..=TRY_LOCKS as u32).contains(&shared.get()));
            shared.assert_drained();
        });
    }

    /// Evaluates that a quiescence waiter always returns while another thread
    /// locks and unlocks, and never disturbs the lock state.
    pub fn quiescent_wait_join<R: Relax + 'static>() {
        model(|| {
            let shared = Arc::new(Shared::<R>::new());
            let locker = {
                let shared = Arc::clone(&shared);
                thread::spawn(move || shared.inc())
            };
            let waiter = {
                let shared = Arc::clone(&shared);
                thread::spawn(move || {
                    shared.lock.wait_quiescent();
                })
            };
            locker.join().unwrap();
            waiter.join().unwrap();
            assert_eq!(shared.get(), 1);
            shared.assert_drained();
        });
    }

    /// Evaluates that a waiter announcing itself on the quiescence channel
    /// while the only holder releases the lock never misses that release.
    /// No other unlock follows, so a lost wake-up leaves the waiter spinning
    /// in the futex emulation forever.
    pub fn quiescent_wait_races_release<R: Relax + 'static>() {
        model(|| {
            let shared = Arc::new(Shared::<R>::new());
            shared.lock.lock();
            let waiter = {
                let shared = Arc::clone(&shared);
                thread::spawn(move || {
                    shared.lock.wait_quiescent();
                })
            };
            // SAFETY: locked before the waiter was spawned.
            unsafe { shared.lock.unlock() };
            waiter.join().unwrap();
            shared.assert_drained();
        });
    }
}
