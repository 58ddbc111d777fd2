//! Locking interfaces compatible with [lock_api].
//!
//! This module exports [`lock_api::Mutex`] and [`lock_api::MutexGuard`] type
//! aliases with a [`raw::RawMutex`] as their raw lock. The raw lock
//! implements the [`lock_api::RawMutex`] trait when this feature is enabled.
//!
//! `lock_api` has no notion of quiescence, and its mutexes only expose the
//! raw lock through an `unsafe` accessor. Waiting for the lock to drain
//! through these aliases therefore goes through [`wait_quiescent`].
//!
//! [`raw::RawMutex`]: crate::raw::RawMutex
//! [lock_api]: https://crates.io/crates/lock_api
//! [`lock_api::Mutex`]: https://docs.rs/lock_api/latest/lock_api/struct.Mutex.html
//! [`lock_api::MutexGuard`]: https://docs.rs/lock_api/latest/lock_api/struct.MutexGuard.html
//! [`lock_api::RawMutex`]: https://docs.rs/lock_api/latest/lock_api/trait.RawMutex.html

use crate::raw::{self, Path};
use crate::relax::Relax;

#[cfg(test)]
use crate::test::{LockData, LockNew, LockThen};

/// A [`lock_api::Mutex`] alias that wraps a [`raw::RawMutex`].
///
/// [`lock_api::Mutex`]: https://docs.rs/lock_api/latest/lock_api/struct.Mutex.html
pub type Mutex<T, R> = ::lock_api::Mutex<raw::RawMutex<R>, T>;

/// A [`lock_api::MutexGuard`] alias that wraps a [`raw::RawMutex`].
///
/// [`lock_api::MutexGuard`]: https://docs.rs/lock_api/latest/lock_api/struct.MutexGuard.html
pub type MutexGuard<'a, T, R> = ::lock_api::MutexGuard<'a, raw::RawMutex<R>, T>;

/// Blocks the current thread until `mutex` is observed unlocked, without
/// locking it.
///
/// # Examples
///
/// ```
/// use futexlock::lock_api::{spins::Mutex, wait_quiescent};
///
/// let mutex = Mutex::new(0);
/// wait_quiescent(&mutex);
/// ```
pub fn wait_quiescent<T: ?Sized, R: Relax>(mutex: &Mutex<T, R>) -> Path {
    // SAFETY: Waiting for quiescence never changes the lock state, so it
    // cannot break the invariants `lock_api` relies on.
    unsafe { mutex.raw() }.wait_quiescent()
}

/// A `lock_api` mutex that signals the processor that it is running a
/// busy-wait spin-loop before sleeping.
pub mod spins {
    use crate::relax::Spin;

    /// A [`lock_api::Mutex`] that implements the [`Spin`] relax strategy.
    ///
    /// # Example
    ///
    /// ```
    /// use futexlock::lock_api::spins::Mutex;
    ///
    /// let mutex = Mutex::new(0);
    /// let guard = mutex.lock();
    /// assert_eq!(*guard, 0);
    /// ```
    /// [`lock_api::Mutex`]: https://docs.rs/lock_api/latest/lock_api/struct.Mutex.html
    pub type Mutex<T> = super::Mutex<T, Spin>;

    /// A [`lock_api::MutexGuard`] that implements the [`Spin`] relax strategy.
    ///
    /// [`lock_api::MutexGuard`]: https://docs.rs/lock_api/latest/lock_api/struct.MutexGuard.html
    pub type MutexGuard<'a, T> = super::MutexGuard<'a, T, Spin>;
}

/// A `lock_api` mutex that yields the current time slice to the OS scheduler
/// before sleeping.
#[cfg(any(feature = "yield", test))]
#[cfg_attr(docsrs, doc(cfg(feature = "yield")))]
pub mod yields {
    use crate::relax::Yield;

    /// A [`lock_api::Mutex`] that implements the [`Yield`] relax strategy.
    ///
    /// # Example
    ///
    /// ```
    /// use futexlock::lock_api::yields::Mutex;
    ///
    /// let mutex = Mutex::new(0);
    /// let guard = mutex.lock();
    /// assert_eq!(*guard, 0);
    /// ```
    /// [`lock_api::Mutex`]: https://docs.rs/lock_api/latest/lock_api/struct.Mutex.html
    pub type Mutex<T> = super::Mutex<T, Yield>;

    /// A [`lock_api::MutexGuard`] that implements the [`Yield`] relax strategy.
    ///
    /// [`lock_api::MutexGuard`]: https://docs.rs/lock_api/latest/lock_api/struct.MutexGuard.html
    pub type MutexGuard<'a, T> = super::MutexGuard<'a, T, Yield>;
}

/// A `lock_api` mutex that rereads the state without any hint to the
/// processor before sleeping.
pub mod loops {
    use crate::relax::Loop;

    /// A [`lock_api::Mutex`] that implements the [`Loop`] relax strategy.
    ///
    /// # Example
    ///
    /// ```
    /// use futexlock::lock_api::loops::Mutex;
    ///
    /// let mutex = Mutex::new(0);
    /// let guard = mutex.lock();
    /// assert_eq!(*guard, 0);
    /// ```
    /// [`lock_api::Mutex`]: https://docs.rs/lock_api/latest/lock_api/struct.Mutex.html
    pub type Mutex<T> = super::Mutex<T, Loop>;

    /// A [`lock_api::MutexGuard`] that implements the [`Loop`] relax strategy.
    ///
    /// [`lock_api::MutexGuard`]: https://docs.rs/lock_api/latest/lock_api/struct.MutexGuard.html
    pub type MutexGuard<'a, T> = super::MutexGuard<'a, T, Loop>;
}

#[cfg(test)]
impl<T: ?Sized, R: Relax> LockNew for Mutex<T, R> {
    type Target = T;

    fn new(value: Self::Target) -> Self
    where
        Self::Target: Sized,
    {
        Self::new(value)
    }
}

#[cfg(test)]
impl<T: ?Sized, R: Relax> LockThen for Mutex<T, R> {
    type Guard<'a> = MutexGuard<'a, T, R>
    where
        Self: 'a,
        Self::Target: 'a;

    fn lock_then<F, Ret>(&self, f: F) -> Ret
    where
        F: FnOnce(MutexGuard<'_, T, R>) -> Ret,
    {
        f(self.lock())
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
        wait_quiescent(self)
    }
}

#[cfg(test)]
impl<T: ?Sized, R: Relax> LockData for Mutex<T, R> {
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

#[cfg(test)]
mod test {
    use crate::lock_api::yields::Mutex;
    use crate::test::tests;

    #[test]
    fn lots_and_lots_lock() {
        tests::lots_and_lots_lock::<Mutex<_>>();
    }

    #[test]
    fn lots_and_lots_mixed_lock() {
        tests::lots_and_lots_mixed_lock::<Mutex<_>>();
    }

    #[test]
    fn smoke() {
        tests::smoke::<Mutex<_>>();
    }

    #[test]
    fn test_guard_debug_display() {
        tests::test_guard_debug_display::<Mutex<_>>();
    }

    #[test]
    fn test_mutex_default() {
        tests::test_mutex_default::<Mutex<_>>();
    }

    #[test]
    fn test_mutex_from() {
        tests::test_mutex_from::<Mutex<_>>();
    }

    #[test]
    fn test_try_lock() {
        tests::test_try_lock::<Mutex<_>>();
    }

    #[test]
    fn test_into_inner() {
        tests::test_into_inner::<Mutex<_>>();
    }

    #[test]
    fn test_get_mut() {
        tests::test_get_mut::<Mutex<_>>();
    }

    #[test]
    fn test_lock_arc_access_in_unwind() {
        tests::test_lock_arc_access_in_unwind::<Mutex<_>>();
    }

    #[test]
    fn test_lock_array() {
        tests::test_lock_array::<Mutex<_>>();
    }

    #[test]
    fn quiescent_wait_sees_every_release() {
        tests::quiescent_wait_sees_every_release::<Mutex<_>>();
    }

    #[test]
    fn peek_tracks_guard_lifetime() {
        tests::peek_tracks_guard_lifetime::<Mutex<_>>();
    }
}
