use core::fmt::{self, Debug, Formatter};
use core::marker::PhantomData;
use core::sync::atomic::Ordering::{Acquire, Relaxed, SeqCst};

use crate::cfg::atomic::AtomicU32;
use crate::cfg::trace;
use crate::futex::Futex;
use crate::relax::Relax;
use crate::state::{self, CONTENDER, HELD};

/// Number of times a thread reads the state word before it sleeps.
#[cfg(not(all(loom, test)))]
const SPIN_BOUND: u32 = 20;

/// Loom explores every interleaving of every spin iteration, keep it short.
#[cfg(all(loom, test))]
const SPIN_BOUND: u32 = 2;

/// Nobody is sleeping on the quiescence channel.
const IDLE: u32 = 0;

/// At least one thread is, or is about to be, sleeping on the quiescence
/// channel.
const WAITING: u32 = 1;

/// Which path a blocking operation took before it returned.
///
/// Returned by [`RawMutex::lock`] and [`RawMutex::wait_quiescent`] for
/// instrumentation. Callers have no obligation to inspect it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Path {
    /// Returned without ever sleeping in the kernel.
    Fast,
    /// Slept on the futex at least once.
    Slow,
}

impl Path {
    /// Returns `true` if the operation never slept.
    #[inline]
    #[must_use]
    pub const fn is_fast(self) -> bool {
        matches!(self, Self::Fast)
    }

    /// Returns `true` if the operation slept at least once.
    #[inline]
    #[must_use]
    pub const fn is_slow(self) -> bool {
        matches!(self, Self::Slow)
    }
}

/// A raw futex based mutual exclusion lock with a quiescence signal.
///
/// This lock does not protect any data by itself, see [`Mutex`] for the data
/// owning counterpart. It spins for a short, fixed number of iterations
/// relaxing with `R` in between, and then sleeps on a futex until woken by
/// an unlock. Sleeping contenders are counted in the same word as the lock
/// bit, so an uncontended unlock never enters the kernel.
///
/// Besides locking, threads can ask whether the lock is currently held
/// ([`is_locked`]) or sleep until it is observed free
/// ([`wait_quiescent`]), without ever acquiring it.
///
/// The lock is not fair and not reentrant: locking it twice from the same
/// thread deadlocks.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use std::thread;
///
/// use futexlock::raw::spins::RawMutex;
///
/// let lock = Arc::new(RawMutex::new());
/// let c_lock = Arc::clone(&lock);
///
/// let _path = lock.lock();
/// let waiter = thread::spawn(move || {
///     // Returns once the main thread unlocks, without taking the lock.
///     c_lock.wait_quiescent();
///     assert!(!c_lock.is_locked());
/// });
/// // SAFETY: the lock is held by this thread.
/// unsafe { lock.unlock() };
/// waiter.join().expect("thread::spawn failed");
/// ```
///
/// [`Mutex`]: crate::Mutex
/// [`is_locked`]: RawMutex::is_locked
/// [`wait_quiescent`]: RawMutex::wait_quiescent
pub struct RawMutex<R> {
    state: AtomicU32,
    quiescence: AtomicU32,
    marker: PhantomData<R>,
}

// SAFETY: The relax type is only ever instantiated on the stack of the
// thread running a spin phase, never stored in the mutex.
unsafe impl<R> Send for RawMutex<R> {}
// SAFETY: Same as above, all shared state is atomic.
unsafe impl<R> Sync for RawMutex<R> {}

impl<R> RawMutex<R> {
    /// Creates a new, unlocked mutex.
    ///
    /// # Examples
    ///
    /// ```
    /// use futexlock::raw::spins::RawMutex;
    ///
    /// static LOCK: RawMutex = RawMutex::new();
    /// assert!(!LOCK.is_locked());
    /// ```
    #[cfg(not(all(loom, test)))]
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        let state = AtomicU32::new(state::FREE);
        let quiescence = AtomicU32::new(IDLE);
        Self { state, quiescence, marker: PhantomData }
    }

    /// Creates a new, unlocked mutex with Loom primitives (non-const).
    #[cfg(all(loom, test))]
    #[cfg(not(tarpaulin_include))]
    pub fn new() -> Self {
        let state = AtomicU32::new(state::FREE);
        let quiescence = AtomicU32::new(IDLE);
        Self { state, quiescence, marker: PhantomData }
    }

    /// Returns `true` if the lock is currently held.
    ///
    /// This is a single relaxed read: the answer may already be stale by
    /// the time the caller looks at it.
    ///
    /// # Examples
    ///
    /// ```
    /// use futexlock::raw::spins::RawMutex;
    ///
    /// let lock = RawMutex::new();
    /// assert!(!lock.is_locked());
    /// lock.lock();
    /// assert!(lock.is_locked());
    /// // SAFETY: the lock is held by this thread.
    /// unsafe { lock.unlock() };
    /// assert!(!lock.is_locked());
    /// ```
    #[inline]
    pub fn is_locked(&self) -> bool {
        state::is_held(self.state.load(Relaxed))
    }

    /// Returns the number of threads registered as sleeping contenders.
    ///
    /// Diagnostic only. Like [`is_locked`], it is a single relaxed read.
    ///
    /// [`is_locked`]: RawMutex::is_locked
    #[inline]
    pub fn contenders(&self) -> u32 {
        state::contenders(self.state.load(Relaxed))
    }

    /// Attempts to acquire this lock without blocking.
    ///
    /// Returns `true` if the lock was acquired. The caller is then
    /// responsible for calling [`unlock`].
    ///
    /// # Examples
    ///
    /// ```
    /// use futexlock::raw::spins::RawMutex;
    ///
    /// let lock = RawMutex::new();
    /// assert!(lock.try_lock());
    /// assert!(!lock.try_lock());
    /// // SAFETY: the lock is held by this thread.
    /// unsafe { lock.unlock() };
    /// ```
    ///
    /// [`unlock`]: RawMutex::unlock
    #[inline]
    pub fn try_lock(&self) -> bool {
        let mut word = self.state.load(Relaxed);
        while !state::is_held(word) {
            let next = state::acquired_spinning(word);
            match self.state.compare_exchange(word, next, Acquire, Relaxed) {
                Ok(_) => return true,
                // Only the contender count moved, the lock is still free.
                Err(observed) => word = observed,
            }
        }
        false
    }

    /// Releases this lock.
    ///
    /// If other threads registered as contenders, exactly one of them is
    /// woken and races for the lock against any thread still spinning. If
    /// nobody did, the lock is now fully free and every thread sleeping in
    /// [`wait_quiescent`] is woken.
    ///
    /// Safe code cannot release a lock it does not hold:
    ///
    /// ```compile_fail,E0133
    /// use futexlock::raw::spins::RawMutex;
    ///
    /// let lock = RawMutex::new();
    /// lock.unlock();
    /// ```
    ///
    /// # Safety
    ///
    /// The lock must be held by the current context. Unlocking a lock that
    /// is not held corrupts the contender count. Debug builds panic instead.
    ///
    /// [`wait_quiescent`]: RawMutex::wait_quiescent
    #[inline]
    pub unsafe fn unlock(&self) {
        let prior = self.state.fetch_sub(HELD, SeqCst);
        debug_assert!(state::is_held(prior), "unlocked a mutex that is not locked (state {prior:#x})");
        if prior != HELD {
            self.wake_contender();
        } else if self.quiescence.load(SeqCst) == WAITING {
            self.wake_quiescent();
        }
    }

    #[cold]
    fn wake_contender(&self) {
        trace!("waking one contender of {:p}", self);
        self.state.wake_one();
    }

    #[cold]
    fn wake_quiescent(&self) {
        trace!("{:p} became free, waking quiescence waiters", self);
        self.quiescence.store(IDLE, SeqCst);
        self.quiescence.wake_all();
    }

    /// Installs the held bit over `word`, keeping the contender count. May
    /// fail spuriously, callers must be spinning anyway.
    #[inline(always)]
    fn try_acquire_spinning(&self, word: u32) -> bool {
        let next = state::acquired_spinning(word);
        self.state.compare_exchange_weak(word, next, Acquire, Relaxed).is_ok()
    }
}

impl<R: Relax> RawMutex<R> {
    /// Acquires this lock, blocking the current thread until it is able to
    /// do so.
    ///
    /// The thread first spins on the state word, relaxing with `R`, trying
    /// to take the lock the moment it is observed free. If that fails for
    /// the whole spin phase, it registers as a contender and sleeps until
    /// an unlock wakes it.
    ///
    /// Returns [`Path::Slow`] if the thread slept at least once, and
    /// [`Path::Fast`] otherwise. Once this returns, the caller must
    /// eventually call [`unlock`].
    ///
    /// # Examples
    ///
    /// ```
    /// use futexlock::raw::{spins::RawMutex, Path};
    ///
    /// let lock = RawMutex::new();
    /// assert_eq!(lock.lock(), Path::Fast);
    /// // SAFETY: the lock is held by this thread.
    /// unsafe { lock.unlock() };
    /// ```
    ///
    /// [`unlock`]: RawMutex::unlock
    pub fn lock(&self) -> Path {
        let mut relax = R::new();
        let mut spins = 0;
        while spins < SPIN_BOUND {
            let word = self.state.load(Relaxed);
            if state::is_held(word) {
                relax.relax();
                spins += 1;
            } else if self.try_acquire_spinning(word) {
                return Path::Fast;
            }
        }
        self.lock_contended()
    }

    #[cold]
    fn lock_contended(&self) -> Path {
        self.state.fetch_add(CONTENDER, Relaxed);
        let mut path = Path::Fast;
        loop {
            let word = self.state.load(Relaxed);
            if state::is_held(word) {
                trace!("sleeping on {:p}, state {:#x}", self, word);
                self.state.wait_if_equal(word);
                path = Path::Slow;
            } else {
                let next = state::acquired_contended(word);
                if self.state.compare_exchange_weak(word, next, Acquire, Relaxed).is_ok() {
                    return path;
                }
            }
        }
    }

    /// Blocks the current thread until the lock is observed unheld, without
    /// acquiring it.
    ///
    /// Returns as soon as the held bit is seen clear at least once after the
    /// call began. There is no guarantee that the lock is still free when
    /// the caller acts on it. The thread spins first, then sleeps on the
    /// quiescence channel, which is signaled by the unlock that leaves the
    /// lock with no holder and no registered contender.
    ///
    /// After announcing itself on the quiescence channel, the thread reads
    /// the state word once more before sleeping. An unlock that completed in
    /// between, and thus saw no announcement, is caught by that read rather
    /// than delaying this thread until the next time the lock drains. The
    /// read is a read-modify-write that leaves the word unchanged: it is
    /// ordered against the `fetch_sub` of every unlock, so an unlock that
    /// comes after it also sees the announcement.
    ///
    /// Returns [`Path::Slow`] if the thread slept at least once, and
    /// [`Path::Fast`] otherwise.
    ///
    /// # Examples
    ///
    /// ```
    /// use futexlock::raw::{spins::RawMutex, Path};
    ///
    /// let lock = RawMutex::new();
    /// assert_eq!(lock.wait_quiescent(), Path::Fast);
    /// ```
    pub fn wait_quiescent(&self) -> Path {
        let mut path = Path::Fast;
        loop {
            let mut relax = R::new();
            for _ in 0..SPIN_BOUND {
                if !state::is_held(self.state.load(Acquire)) {
                    return path;
                }
                relax.relax();
            }
            self.quiescence.store(WAITING, SeqCst);
            if !state::is_held(self.state.fetch_add(0, SeqCst)) {
                return path;
            }
            trace!("waiting for {:p} to become free", self);
            self.quiescence.wait_if_equal(WAITING);
            path = Path::Slow;
        }
    }
}

#[cfg(not(all(loom, test)))]
impl<R> Default for RawMutex<R> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<R> Debug for RawMutex<R> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let word = self.state.load(Relaxed);
        f.debug_struct("RawMutex")
            .field("locked", &state::is_held(word))
            .field("contenders", &state::contenders(word))
            .finish()
    }
}

#[cfg(all(feature = "lock_api", not(loom)))]
unsafe impl<R: Relax> lock_api::RawMutex for RawMutex<R> {
    type GuardMarker = lock_api::GuardSend;

    #[allow(clippy::declare_interior_mutable_const)]
    const INIT: Self = Self::new();

    #[inline]
    fn lock(&self) {
        Self::lock(self);
    }

    #[inline]
    fn try_lock(&self) -> bool {
        Self::try_lock(self)
    }

    #[inline]
    unsafe fn unlock(&self) {
        Self::unlock(self);
    }

    #[inline]
    fn is_locked(&self) -> bool {
        Self::is_locked(self)
    }
}

#[cfg(all(not(loom), test))]
mod test {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::mpsc::channel;
    use std::sync::{Arc, Barrier};
    use std::thread;
    use std::time::Duration;

    use super::{Path, IDLE, WAITING};
    use crate::raw::{loops, spins, yields};
    use crate::state::{self, CONTENDER, HELD};

    type RawMutex = spins::RawMutex;

    const HOLD: Duration = Duration::from_millis(50);

    /// Holds `lock` on another thread for `HOLD`, returns once it is held.
    fn hold_elsewhere(lock: &Arc<RawMutex>) -> thread::JoinHandle<()> {
        let (tx, rx) = channel();
        let c_lock = Arc::clone(lock);
        let handle = thread::spawn(move || {
            c_lock.lock();
            tx.send(()).unwrap();
            thread::sleep(HOLD);
            // SAFETY: the lock is held by this thread.
            unsafe { c_lock.unlock() };
        });
        rx.recv().unwrap();
        handle
    }

    #[test]
    fn uncontended_lock_is_fast() {
        let lock = RawMutex::new();
        for _ in 0..10 {
            assert_eq!(lock.lock(), Path::Fast);
            assert!(lock.is_locked());
            unsafe { lock.unlock() };
            assert!(!lock.is_locked());
        }
        assert!(state::is_free(lock.state.load(Ordering::Relaxed)));
    }

    #[test]
    fn contended_lock_sleeps() {
        let lock = Arc::new(RawMutex::new());
        let holder = hold_elsewhere(&lock);
        assert_eq!(lock.lock(), Path::Slow);
        assert_eq!(lock.contenders(), 0);
        unsafe { lock.unlock() };
        holder.join().unwrap();
        assert!(state::is_free(lock.state.load(Ordering::Relaxed)));
    }

    #[test]
    fn sleeping_contender_is_counted() {
        let lock = Arc::new(RawMutex::new());
        lock.lock();
        let c_lock = Arc::clone(&lock);
        let contender = thread::spawn(move || {
            c_lock.lock();
            unsafe { c_lock.unlock() };
        });
        while lock.contenders() == 0 {
            thread::yield_now();
        }
        assert_eq!(lock.contenders(), 1);
        assert!(lock.is_locked());
        unsafe { lock.unlock() };
        contender.join().unwrap();
        assert_eq!(lock.contenders(), 0);
        assert!(!lock.is_locked());
    }

    #[test]
    fn try_lock_fails_while_held() {
        let lock = RawMutex::new();
        assert!(lock.try_lock());
        assert!(!lock.try_lock());
        unsafe { lock.unlock() };
        assert!(lock.try_lock());
        unsafe { lock.unlock() };
    }

    #[test]
    fn try_lock_takes_free_lock_with_contenders() {
        let lock = RawMutex::new();
        // A woken contender has not retaken the lock yet.
        lock.state.store(state::encode(false, 2), Ordering::Relaxed);
        assert!(lock.try_lock());
        assert_eq!(lock.state.load(Ordering::Relaxed), state::encode(true, 2));
        assert!(!lock.try_lock());
        lock.state.store(state::FREE, Ordering::Relaxed);
    }

    #[test]
    fn try_lock_survives_contender_count_churn() {
        let lock = Arc::new(RawMutex::new());
        let stop = Arc::new(AtomicBool::new(false));
        let churn = {
            let (lock, stop) = (lock.clone(), stop.clone());
            thread::spawn(move || {
                while !stop.load(Ordering::Relaxed) {
                    lock.state.fetch_add(CONTENDER, Ordering::Relaxed);
                    lock.state.fetch_sub(CONTENDER, Ordering::Relaxed);
                }
            })
        };
        for _ in 0..10_000 {
            // Only the count moves, the lock is never held by anyone else.
            assert!(lock.try_lock());
            lock.state.fetch_sub(HELD, Ordering::Release);
        }
        stop.store(true, Ordering::Relaxed);
        churn.join().unwrap();
        assert!(state::is_free(lock.state.load(Ordering::Relaxed)));
    }

    #[test]
    fn quiescent_wait_on_free_lock_is_fast() {
        let lock = RawMutex::new();
        assert_eq!(lock.wait_quiescent(), Path::Fast);
        assert!(!lock.is_locked());
    }

    #[test]
    fn quiescent_wait_does_not_acquire() {
        let lock = Arc::new(RawMutex::new());
        let holder = hold_elsewhere(&lock);
        assert_eq!(lock.wait_quiescent(), Path::Slow);
        holder.join().unwrap();
        assert_eq!(lock.contenders(), 0);
        assert!(lock.try_lock());
        unsafe { lock.unlock() };
    }

    #[test]
    fn drained_unlock_clears_quiescence_flag() {
        let lock = Arc::new(RawMutex::new());
        for _ in 0..3 {
            lock.lock();
            let waiter = {
                let c_lock = Arc::clone(&lock);
                thread::spawn(move || c_lock.wait_quiescent())
            };
            while lock.quiescence.load(Ordering::Relaxed) != WAITING {
                thread::yield_now();
            }
            unsafe { lock.unlock() };
            waiter.join().unwrap();
            assert_eq!(lock.quiescence.load(Ordering::Relaxed), IDLE);
        }
    }

    #[test]
    fn quiescent_wait_never_misses_the_last_release() {
        const ROUNDS: usize = 200;
        let lock = Arc::new(RawMutex::new());
        for _ in 0..ROUNDS {
            lock.lock();
            let (tx, rx) = channel();
            let c_lock = Arc::clone(&lock);
            thread::spawn(move || {
                c_lock.wait_quiescent();
                tx.send(()).unwrap();
            });
            // Vary how far the waiter gets before the release.
            for _ in 0..ROUNDS {
                std::hint::spin_loop();
            }
            unsafe { lock.unlock() };
            // No other unlock follows: a missed wake-up hangs the waiter.
            rx.recv_timeout(Duration::from_secs(5)).unwrap();
        }
    }

    #[test]
    fn mutual_exclusion_under_contention() {
        const THREADS: usize = 8;
        const ITERS: usize = 2_000;
        let lock = Arc::new(RawMutex::new());
        let inside = Arc::new(AtomicBool::new(false));
        let count = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(THREADS));
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let (lock, inside, count) = (lock.clone(), inside.clone(), count.clone());
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    for _ in 0..ITERS {
                        lock.lock();
                        assert!(!inside.swap(true, Ordering::Relaxed));
                        count.fetch_add(1, Ordering::Relaxed);
                        inside.store(false, Ordering::Relaxed);
                        unsafe { lock.unlock() };
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(count.load(Ordering::Relaxed), THREADS * ITERS);
        assert!(state::is_free(lock.state.load(Ordering::Relaxed)));
    }

    #[test]
    fn other_relax_strategies_lock() {
        let lock = yields::RawMutex::new();
        assert_eq!(lock.lock(), Path::Fast);
        unsafe { lock.unlock() };
        let lock = loops::RawMutex::new();
        assert_eq!(lock.lock(), Path::Fast);
        unsafe { lock.unlock() };
        let lock = spins::backoff::RawMutex::new();
        assert_eq!(lock.wait_quiescent(), Path::Fast);
    }

    #[test]
    fn debug_reports_state() {
        let lock = RawMutex::new();
        assert_eq!(format!("{lock:?}"), "RawMutex { locked: false, contenders: 0 }");
        lock.lock();
        assert_eq!(format!("{lock:?}"), "RawMutex { locked: true, contenders: 0 }");
        unsafe { lock.unlock() };
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "unlocked a mutex that is not locked")]
    fn unlock_without_lock_is_out_of_contract() {
        let lock = RawMutex::new();
        // SAFETY: not safe, that is the point: debug builds must catch it.
        unsafe { lock.unlock() };
    }
}

#[cfg(all(loom, test))]
mod model {
    use crate::loom::models;
    use crate::relax::Yield;

    #[test]
    fn lock_join() {
        models::lock_join::<Yield>();
    }

    #[test]
    fn try_lock_join() {
        models::try_lock_join::<Yield>();
    }

    #[test]
    fn quiescent_wait_join() {
        models::quiescent_wait_join::<Yield>();
    }

    #[test]
    fn quiescent_wait_races_release() {
        models::quiescent_wait_races_release::<Yield>();
    }
}
