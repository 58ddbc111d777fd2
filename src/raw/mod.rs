//! Futex based lock without data, with a quiescence signal.
//!
//! The [`RawMutex`] here is the whole locking protocol: a single packed
//! state word (see [`state`]) that holds the lock bit and the number of
//! sleeping contenders, plus a flag that lets other threads sleep until the
//! lock drains. Callers pair [`lock`] and [`unlock`] themselves, which is
//! why `unlock` is `unsafe`. The [`Mutex`] type at the crate root wraps it
//! with RAII guards and protected data.
//!
//! This RawMutex is generic over the relax strategy executed between spin
//! iterations. User may choose a strategy as long as it implements the
//! [`Relax`] trait. The following modules provide type aliases for
//! [`RawMutex`] associated with one of the strategies provided by the
//! [`relax`] module.
//!
//! [`lock`]: RawMutex::lock
//! [`unlock`]: RawMutex::unlock
//! [`state`]: crate::state
//! [`Mutex`]: crate::Mutex
//! [`relax`]: crate::relax
//! [`Relax`]: crate::relax::Relax

mod mutex;
pub use mutex::{Path, RawMutex};

/// A raw lock that signals the processor that it is running a busy-wait
/// spin-loop before sleeping.
pub mod spins {
    use super::mutex;
    use crate::relax::Spin;

    /// A [`raw::RawMutex`] that implements the [`Spin`] relax strategy.
    ///
    /// # Example
    ///
    /// ```
    /// use futexlock::raw::spins::RawMutex;
    ///
    /// let lock = RawMutex::new();
    /// lock.lock();
    /// assert!(lock.is_locked());
    /// // SAFETY: the lock is held by this thread.
    /// unsafe { lock.unlock() };
    /// ```
    /// [`raw::RawMutex`]: mutex::RawMutex
    pub type RawMutex = mutex::RawMutex<Spin>;

    /// A raw lock that performs exponential backoff while spinning before
    /// sleeping.
    pub mod backoff {
        use super::mutex;
        use crate::relax::SpinBackoff;

        /// A [`raw::RawMutex`] that implements the [`SpinBackoff`] relax
        /// strategy.
        ///
        /// # Example
        ///
        /// ```
        /// use futexlock::raw::spins::backoff::RawMutex;
        ///
        /// let lock = RawMutex::new();
        /// lock.lock();
        /// // SAFETY: the lock is held by this thread.
        /// unsafe { lock.unlock() };
        /// ```
        /// [`raw::RawMutex`]: mutex::RawMutex
        pub type RawMutex = mutex::RawMutex<SpinBackoff>;
    }
}

/// A raw lock that yields its time slice to the OS scheduler while spinning
/// before sleeping.
#[cfg(any(feature = "yield", test))]
#[cfg_attr(docsrs, doc(cfg(feature = "yield")))]
pub mod yields {
    use super::mutex;
    use crate::relax::Yield;

    /// A [`raw::RawMutex`] that implements the [`Yield`] relax strategy.
    ///
    /// # Example
    ///
    /// ```
    /// use futexlock::raw::yields::RawMutex;
    ///
    /// let lock = RawMutex::new();
    /// lock.lock();
    /// // SAFETY: the lock is held by this thread.
    /// unsafe { lock.unlock() };
    /// ```
    /// [`raw::RawMutex`]: mutex::RawMutex
    pub type RawMutex = mutex::RawMutex<Yield>;
}

/// A raw lock that rereads the state without any hint to the processor
/// before sleeping.
pub mod loops {
    use super::mutex;
    use crate::relax::Loop;

    /// A [`raw::RawMutex`] that implements the [`Loop`] relax strategy.
    ///
    /// # Example
    ///
    /// ```
    /// use futexlock::raw::loops::RawMutex;
    ///
    /// let lock = RawMutex::new();
    /// lock.lock();
    /// // SAFETY: the lock is held by this thread.
    /// unsafe { lock.unlock() };
    /// ```
    /// [`raw::RawMutex`]: mutex::RawMutex
    pub type RawMutex = mutex::RawMutex<Loop>;
}
