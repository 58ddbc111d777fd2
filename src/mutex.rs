//! Data owning mutex built on [`raw::RawMutex`].
//!
//! [`raw::RawMutex`]: crate::raw::RawMutex

use core::cell::UnsafeCell;
use core::fmt::{self, Debug, Display, Formatter};
use core::ops::{Deref, DerefMut};

use crate::raw::{Path, RawMutex};
use crate::relax::Relax;

/// A mutual exclusion primitive useful for protecting shared data.
///
/// This mutex will block threads waiting for the lock to become available,
/// spinning briefly first. The mutex can also be statically initialized or
/// created via a [`new`] constructor. Each mutex has a type parameter which
/// represents the data that it is protecting. The data can only be accessed
/// through the RAII guards returned from [`lock`] and [`try_lock`], which
/// guarantees that the data is only ever accessed when the mutex is locked.
///
/// Unlike most mutexes, threads that only need to know when the data is no
/// longer being worked on can sleep in [`wait_quiescent`] without taking
/// the lock.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use std::thread;
/// use std::sync::mpsc::channel;
///
/// use futexlock::Mutex;
///
/// const N: usize = 10;
///
/// // Spawn a few threads to increment a shared variable (non-atomically), and
/// // let the main thread know once all increments are done.
/// let data = Arc::new(Mutex::new(0));
///
/// let (tx, rx) = channel();
/// for _ in 0..N {
///     let (data, tx) = (data.clone(), tx.clone());
///     thread::spawn(move || {
///         let mut data = data.lock();
///         *data += 1;
///         if *data == N {
///             tx.send(()).unwrap();
///         }
///         // the lock is unlocked here when `data` goes out of scope.
///     });
/// }
///
/// rx.recv().unwrap();
/// ```
/// [`new`]: Mutex::new
/// [`lock`]: Mutex::lock
/// [`try_lock`]: Mutex::try_lock
/// [`wait_quiescent`]: Mutex::wait_quiescent
pub struct Mutex<T: ?Sized, R> {
    raw: RawMutex<R>,
    data: UnsafeCell<T>,
}

// SAFETY: The raw lock serializes every access to `data`.
unsafe impl<T: ?Sized + Send, R> Send for Mutex<T, R> {}
unsafe impl<T: ?Sized + Send, R> Sync for Mutex<T, R> {}

impl<T, R> Mutex<T, R> {
    /// Creates a new mutex in an unlocked state ready for use.
    ///
    /// # Examples
    ///
    /// ```
    /// use futexlock::Mutex;
    ///
    /// static MUTEX: Mutex<i32> = Mutex::new(0);
    /// let mutex = Mutex::new(0);
    /// ```
    #[cfg(not(all(loom, test)))]
    #[inline]
    pub const fn new(value: T) -> Self {
        Self { raw: RawMutex::new(), data: UnsafeCell::new(value) }
    }

    /// Creates a new unlocked mutex with Loom primitives (non-const).
    #[cfg(all(loom, test))]
    #[cfg(not(tarpaulin_include))]
    pub fn new(value: T) -> Self {
        Self { raw: RawMutex::new(), data: UnsafeCell::new(value) }
    }

    /// Consumes this mutex, returning the underlying data.
    ///
    /// # Examples
    ///
    /// ```
    /// use futexlock::Mutex;
    ///
    /// let mutex = Mutex::new(0);
    /// assert_eq!(mutex.into_inner(), 0);
    /// ```
    #[inline]
    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<T: ?Sized, R: Relax> Mutex<T, R> {
    /// Acquires this mutex, blocking the current thread until it is able to
    /// do so.
    ///
    /// Upon returning, the thread is the only thread with the lock held. The
    /// returned guard unlocks the mutex when dropped, and remembers whether
    /// this acquisition had to sleep, see [`MutexGuard::path`].
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    /// use std::thread;
    ///
    /// use futexlock::Mutex;
    ///
    /// let mutex = Arc::new(Mutex::new(0));
    /// let c_mutex = Arc::clone(&mutex);
    ///
    /// thread::spawn(move || {
    ///     *c_mutex.lock() = 10;
    /// })
    /// .join().expect("thread::spawn failed");
    ///
    /// assert_eq!(*mutex.lock(), 10);
    /// ```
    #[inline]
    pub fn lock(&self) -> MutexGuard<'_, T, R> {
        let path = self.raw.lock();
        MutexGuard::new(self, path)
    }

    /// Acquires this mutex and then runs the closure against its guard.
    ///
    /// The mutex is unlocked once the closure returns, unless the closure
    /// moved the guard somewhere else.
    ///
    /// # Examples
    ///
    /// ```
    /// use futexlock::Mutex;
    ///
    /// let mutex = Mutex::new(1);
    /// let two = mutex.lock_then(|mut data| {
    ///     *data += 1;
    ///     *data
    /// });
    /// assert_eq!(two, 2);
    /// ```
    #[inline]
    pub fn lock_then<F, Ret>(&self, f: F) -> Ret
    where
        F: FnOnce(MutexGuard<'_, T, R>) -> Ret,
    {
        f(self.lock())
    }

    /// Blocks the current thread until this mutex is observed unlocked,
    /// without locking it.
    ///
    /// See [`RawMutex::wait_quiescent`] for the exact guarantees. The mutex
    /// may be locked again by the time this returns.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    /// use std::thread;
    ///
    /// use futexlock::Mutex;
    ///
    /// let mutex = Arc::new(Mutex::new(0));
    /// let guard = mutex.lock();
    ///
    /// let c_mutex = Arc::clone(&mutex);
    /// let waiter = thread::spawn(move || {
    ///     c_mutex.wait_quiescent();
    /// });
    ///
    /// drop(guard);
    /// waiter.join().expect("thread::spawn failed");
    /// ```
    #[inline]
    pub fn wait_quiescent(&self) -> Path {
        self.raw.wait_quiescent()
    }
}

impl<T: ?Sized, R> Mutex<T, R> {
    /// Attempts to acquire this mutex without blocking the thread.
    ///
    /// If the lock could not be acquired at this time, then [`None`] is
    /// returned. Otherwise, an RAII guard is returned. The lock will be
    /// unlocked when the guard is dropped.
    ///
    /// # Examples
    ///
    /// ```
    /// use futexlock::Mutex;
    ///
    /// let mutex = Mutex::new(0);
    /// let guard = mutex.try_lock();
    /// assert!(guard.is_some());
    /// assert!(mutex.try_lock().is_none());
    /// ```
    #[inline]
    pub fn try_lock(&self) -> Option<MutexGuard<'_, T, R>> {
        self.raw.try_lock().then(|| MutexGuard::new(self, Path::Fast))
    }

    /// Returns `true` if the lock is currently held.
    ///
    /// This function does not guarantee strong ordering, only atomicity.
    ///
    /// # Examples
    ///
    /// ```
    /// use futexlock::Mutex;
    ///
    /// let mutex = Mutex::new(0);
    /// let guard = mutex.lock();
    /// assert!(mutex.is_locked());
    /// drop(guard);
    /// assert!(!mutex.is_locked());
    /// ```
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.raw.is_locked()
    }

    /// Returns a mutable reference to the underlying data.
    ///
    /// Since this call borrows the `Mutex` mutably, no actual locking needs to
    /// take place - the mutable borrow statically guarantees no locks exist.
    ///
    /// # Examples
    ///
    /// ```
    /// use futexlock::Mutex;
    ///
    /// let mut mutex = Mutex::new(0);
    /// *mutex.get_mut() = 10;
    /// assert_eq!(*mutex.lock(), 10);
    /// ```
    #[inline]
    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }
}

#[cfg(not(all(loom, test)))]
impl<T: Default, R> Default for Mutex<T, R> {
    /// Creates a `Mutex<T, R>`, with the `Default` value for `T`.
    #[inline]
    fn default() -> Self {
        Self::new(Default::default())
    }
}

#[cfg(not(all(loom, test)))]
impl<T, R> From<T> for Mutex<T, R> {
    /// Creates a `Mutex<T, R>` from a instance of `T`.
    #[inline]
    fn from(data: T) -> Self {
        Self::new(data)
    }
}

impl<T: ?Sized + Debug, R> Debug for Mutex<T, R> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("Mutex");
        match self.try_lock() {
            Some(guard) => d.field("data", &&*guard),
            None => d.field("data", &format_args!("<locked>")),
        };
        d.finish()
    }
}

/// An RAII implementation of a "scoped lock" of a mutex. When this structure
/// is dropped (falls out of scope), the lock will be unlocked.
///
/// The data protected by the mutex can be accessed through this guard via
/// its [`Deref`] and [`DerefMut`] implementations.
///
/// This structure is returned by [`lock`] and [`try_lock`] methods on
/// [`Mutex`]. It is also given as closure parameter by [`lock_then`].
///
/// [`lock`]: Mutex::lock
/// [`try_lock`]: Mutex::try_lock
/// [`lock_then`]: Mutex::lock_then
#[must_use = "if unused the Mutex will immediately unlock"]
pub struct MutexGuard<'a, T: ?Sized, R> {
    lock: &'a Mutex<T, R>,
    path: Path,
}

// Same unsafe impls as `std::sync::MutexGuard`, plus `Send` since unlocking
// from another thread is fine for a futex word.
unsafe impl<T: ?Sized + Send, R> Send for MutexGuard<'_, T, R> {}
unsafe impl<T: ?Sized + Sync, R> Sync for MutexGuard<'_, T, R> {}

impl<'a, T: ?Sized, R> MutexGuard<'a, T, R> {
    const fn new(lock: &'a Mutex<T, R>, path: Path) -> Self {
        Self { lock, path }
    }

    /// Returns whether the acquisition that produced this guard slept.
    ///
    /// This is an associated function to not collide with methods of `T`.
    ///
    /// # Examples
    ///
    /// ```
    /// use futexlock::{Mutex, MutexGuard};
    /// use futexlock::raw::Path;
    ///
    /// let mutex = Mutex::new(0);
    /// let guard = mutex.lock();
    /// assert_eq!(MutexGuard::path(&guard), Path::Fast);
    /// ```
    #[inline]
    pub fn path(this: &Self) -> Path {
        this.path
    }
}

impl<T: ?Sized, R> Deref for MutexGuard<'_, T, R> {
    type Target = T;

    /// Dereferences the guard to access the underlying data.
    #[inline]
    fn deref(&self) -> &T {
        // SAFETY: A guard instance holds the lock locked.
        unsafe { &*self.lock.data.get() }
    }
}

impl<T: ?Sized, R> DerefMut for MutexGuard<'_, T, R> {
    /// Mutably dereferences the guard to access the underlying data.
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: A guard instance holds the lock locked.
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T: ?Sized, R> Drop for MutexGuard<'_, T, R> {
    #[inline]
    fn drop(&mut self) {
        // SAFETY: A guard instance holds the lock locked.
        unsafe { self.lock.raw.unlock() }
    }
}

impl<T: ?Sized + Debug, R> Debug for MutexGuard<'_, T, R> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(&**self, f)
    }
}

impl<T: ?Sized + Display, R> Display for MutexGuard<'_, T, R> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&**self, f)
    }
}

#[cfg(test)]
impl<T: ?Sized, R: Relax> crate::test::LockNew for Mutex<T, R> {
    type Target = T;

    fn new(value: Self::Target) -> Self
    where
        Self::Target: Sized,
    {
        Self::new(value)
    }
}

#[cfg(test)]
impl<T: ?Sized, R: Relax> crate::test::LockThen for Mutex<T, R> {
    type Guard<'a> = MutexGuard<'a, T, R>
    where
        Self: 'a,
        Self::Target: 'a;

    fn lock_then<F, Ret>(&self, f: F) -> Ret
    where
        F: FnOnce(MutexGuard<'_, T, R>) -> Ret,
    {
        self.lock_then(f)
    }

    fn try_lock_then<F, Ret>(&self, f: F) -> Ret
    where
        F: FnOnce(Option<MutexGuard<'_, T, R>>) -> Ret,
    {
        f(self.try_lock())
    }

    fn is_locked(&self) -> bool {
        self.is_locked()
    }

    fn wait_quiescent(&self) -> Path {
        self.wait_quiescent()
    }
}

#[cfg(all(not(loom), test))]
impl<T: ?Sized, R: Relax> crate::test::LockData for Mutex<T, R> {
    fn into_inner(self) -> Self::Target
    where
        Self::Target: Sized,
    {
        self.into_inner()
    }

    fn get_mut(&mut self) -> &mut Self::Target {
        self.get_mut()
    }
}

#[cfg(all(not(loom), test))]
mod test {
    use crate::mutex::Mutex;
    use crate::relax::{Spin, Yield};
    use crate::test::tests;

    type SpinMutex<T> = Mutex<T, Spin>;
    type YieldMutex<T> = Mutex<T, Yield>;

    #[test]
    fn lots_and_lots_lock() {
        tests::lots_and_lots_lock::<SpinMutex<_>>();
        tests::lots_and_lots_lock::<YieldMutex<_>>();
    }

    #[test]
    fn lots_and_lots_mixed_lock() {
        tests::lots_and_lots_mixed_lock::<SpinMutex<_>>();
    }

    #[test]
    fn smoke() {
        tests::smoke::<SpinMutex<_>>();
    }

    #[test]
    fn test_guard_debug_display() {
        tests::test_guard_debug_display::<SpinMutex<_>>();
    }

    #[test]
    fn test_mutex_debug() {
        tests::test_mutex_debug::<SpinMutex<_>>();
    }

    #[test]
    fn test_mutex_default() {
        tests::test_mutex_default::<SpinMutex<_>>();
    }

    #[test]
    fn test_mutex_from() {
        tests::test_mutex_from::<SpinMutex<_>>();
    }

    #[test]
    fn test_try_lock() {
        tests::test_try_lock::<SpinMutex<_>>();
    }

    #[test]
    fn test_into_inner() {
        tests::test_into_inner::<SpinMutex<_>>();
    }

    #[test]
    fn test_get_mut() {
        tests::test_get_mut::<SpinMutex<_>>();
    }

    #[test]
    fn test_lock_arc_access_in_unwind() {
        tests::test_lock_arc_access_in_unwind::<SpinMutex<_>>();
    }

    #[test]
    fn test_lock_array() {
        tests::test_lock_array::<SpinMutex<_>>();
    }

    #[test]
    fn test_lock_unsized() {
        let mutex: &SpinMutex<[i32]> = &SpinMutex::new([1, 2, 3]);
        {
            let b = &mut *mutex.lock();
            b[0] = 4;
            b[2] = 5;
        }
        let comp: &[i32] = &[4, 2, 5];
        assert_eq!(&*mutex.lock(), comp);
        assert_eq!(mutex.wait_quiescent(), crate::raw::Path::Fast);
        assert!(!mutex.is_locked());
    }

    #[test]
    fn quiescent_wait_sees_every_release() {
        tests::quiescent_wait_sees_every_release::<SpinMutex<_>>();
    }

    #[test]
    fn peek_tracks_guard_lifetime() {
        tests::peek_tracks_guard_lifetime::<SpinMutex<_>>();
    }

    #[test]
    fn guard_remembers_slow_path() {
        use std::sync::mpsc::channel;
        use std::sync::Arc;
        use std::thread;
        use std::time::Duration;

        use crate::mutex::MutexGuard;
        use crate::raw::Path;

        let mutex = Arc::new(SpinMutex::new(0));
        let (tx, rx) = channel();
        let holder = {
            let mutex = Arc::clone(&mutex);
            thread::spawn(move || {
                let mut guard = mutex.lock();
                tx.send(()).unwrap();
                thread::sleep(Duration::from_millis(50));
                *guard += 1;
            })
        };
        rx.recv().unwrap();
        let guard = mutex.lock();
        assert_eq!(MutexGuard::path(&guard), Path::Slow);
        assert_eq!(*guard, 1);
        drop(guard);
        holder.join().unwrap();
        assert_eq!(MutexGuard::path(&mutex.lock()), Path::Fast);
    }
}
