//! A futex based mutual exclusion lock that spins before it sleeps, with a
//! quiescence signal.
//!
//! The whole lock lives in one 32-bit state word: the low bit says whether
//! the lock is held, the remaining bits count the threads that gave up
//! spinning and went to sleep waiting for it (see [`state`]). Acquiring an
//! uncontended lock is a single compare-and-swap, and releasing it is a
//! single atomic subtraction that only enters the kernel when the count says
//! somebody is actually sleeping.
//!
//! The lock also carries a second, one bit futex word used for _quiescence_:
//! a thread that only needs to know when nobody is working under the lock
//! anymore can sleep in [`Mutex::wait_quiescent`] (or
//! [`RawMutex::wait_quiescent`]) without taking the lock itself. The unlock
//! that leaves the lock with no holder and no sleeping contender wakes all
//! such threads at once. [`Mutex::is_locked`] is the non-blocking version of
//! that question.
//!
//! ## Use cases
//!
//! The quiescence signal is meant for schemes where some threads run
//! optimistically, without the lock, as long as nobody holds it, and fall
//! back to waiting for it to drain when somebody does, as in lock elision
//! for hardware transactional memory. For plain mutual exclusion the
//! [`std::sync::Mutex`] or [`parking_lot::Mutex`] are just as good.
//!
//! The lock is not fair: a thread that just released it, or one that just
//! arrived and is still spinning, can take it ahead of the thread that was
//! woken up. It is not reentrant, and it is meant for threads of a single
//! process only.
//!
//! ## Features
//!
//! This crate does not provide any default features. Features that can be
//! enabled are:
//!
//! ### yield
//!
//! Provides the [`Yield`] relax strategy, which calls
//! [`std::thread::yield_now`] between spin iterations instead of issuing a
//! spin hint to the processor.
//!
//! ### lock_api
//!
//! Implements [`lock_api::RawMutex`] for [`RawMutex`] and provides
//! [`lock_api::Mutex`] aliases in the [`lock_api`](mod@lock_api) module.
//!
//! ### log
//!
//! Emits `trace` records through the [log] facade whenever a thread is about
//! to sleep in the kernel or wake threads sleeping there. The uncontended
//! paths never log.
//!
//! [`RawMutex`]: raw::RawMutex
//! [`Mutex::wait_quiescent`]: mutex::Mutex::wait_quiescent
//! [`Mutex::is_locked`]: mutex::Mutex::is_locked
//! [`RawMutex::wait_quiescent`]: raw::RawMutex::wait_quiescent
//! [`Yield`]: relax::Yield
//! [`std::sync::Mutex`]: https://doc.rust-lang.org/std/sync/struct.Mutex.html
//! [`parking_lot::Mutex`]: https://docs.rs/parking_lot/latest/parking_lot/type.Mutex.html
//! [`std::thread::yield_now`]: https://doc.rust-lang.org/std/thread/fn.yield_now.html
//! [`lock_api::RawMutex`]: https://docs.rs/lock_api/latest/lock_api/trait.RawMutex.html
//! [`lock_api::Mutex`]: https://docs.rs/lock_api/latest/lock_api/struct.Mutex.html
//! [log]: https://docs.rs/log/latest/log

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]

pub mod mutex;
pub mod raw;
pub mod relax;
pub mod state;

#[cfg(all(feature = "lock_api", not(loom)))]
#[cfg_attr(docsrs, doc(cfg(feature = "lock_api")))]
pub mod lock_api;

pub(crate) mod cfg;
pub(crate) mod futex;


#[cfg(all(loom, test))]
#[cfg(not(tarpaulin_include))]
pub(crate) mod loom;

/// A [`mutex::Mutex`] that signals the processor that it is running a
/// busy-wait spin-loop before sleeping.
///
/// # Example
///
/// ```
/// use futexlock::Mutex;
///
/// let mutex = Mutex::new(0);
/// let guard = mutex.lock();
/// assert_eq!(*guard, 0);
/// ```
pub type Mutex<T> = mutex::Mutex<T, relax::Spin>;

/// A [`mutex::MutexGuard`] that signals the processor that it is running a
/// busy-wait spin-loop before sleeping.
pub type MutexGuard<'a, T> = mutex::MutexGuard<'a, T, relax::Spin>;
