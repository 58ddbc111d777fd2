// The `Relax` trait shape follows relax.rs from spin-rs, and the backoff
// stepping follows crossbeam-utils' `Backoff`.
//
// Copyright (c) 2014 Mathijs van de Nes
// Copyright (c) 2019 The Crossbeam Project Developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Strategies that determine how a thread pauses between spin iterations.
//!
//! Both the lock acquisition and the quiescence wait spin for a fixed
//! number of iterations before they fall back to sleeping on a futex. The
//! number of iterations is not configurable, but what each iteration does
//! while it waits for the state word to change is: that is the [`Relax`]
//! type parameter of [`RawMutex`] and [`Mutex`].
//!
//! [`RawMutex`]: crate::raw::RawMutex
//! [`Mutex`]: crate::Mutex

/// A trait implemented by spinning relax strategies.
pub trait Relax {
    /// Initialize the state for one spin phase.
    fn new() -> Self;

    /// Pause once between two reads of the lock state.
    fn relax(&mut self);
}

/// Signals the processor that the thread is in a busy-wait loop, through
/// [`core::hint::spin_loop`] (`pause` on x86, `yield` on ARM).
///
/// This is the default strategy and the one the spin bound of this crate is
/// tuned for: twenty pauses are short enough that a lock released by a
/// holder on another core is usually seen before the thread goes to sleep.
pub struct Spin;

impl Relax for Spin {
    #[inline(always)]
    fn new() -> Self {
        Self
    }

    #[inline(always)]
    fn relax(&mut self) {
        core::hint::spin_loop();
    }
}

/// Gives up the rest of the time slice to the OS scheduler on every
/// iteration.
///
/// Useful when there are more runnable threads than cores, where the holder
/// may not even be scheduled while others spin. Under Loom this yields to
/// the model scheduler instead.
#[cfg(any(feature = "yield", test))]
#[cfg_attr(docsrs, doc(cfg(feature = "yield")))]
pub struct Yield;

#[cfg(any(feature = "yield", test))]
impl Relax for Yield {
    #[inline(always)]
    fn new() -> Self {
        Self
    }

    #[inline]
    fn relax(&mut self) {
        crate::cfg::thread::yield_now();
    }
}

/// Rereads the state immediately, without any hint to the processor.
///
/// Exists for targets whose spin hint is miscompiled or unsupported; use
/// [`Spin`] otherwise.
pub struct Loop;

impl Relax for Loop {
    #[inline(always)]
    fn new() -> Self {
        Self
    }

    #[inline(always)]
    fn relax(&mut self) {}
}

/// Spins with exponentially growing pauses, capped at `2^6` hints per
/// iteration.
///
/// With the fixed spin bound this stretches the spin phase before a thread
/// sleeps, which can pay off for critical sections slightly longer than a
/// handful of instructions.
pub struct SpinBackoff {
    step: u32,
}

impl SpinBackoff {
    const SPIN_LIMIT: u32 = 6;
}

impl Relax for SpinBackoff {
    #[inline(always)]
    fn new() -> Self {
        Self { step: 0 }
    }

    #[inline(always)]
    fn relax(&mut self) {
        for _ in 0..1u32 << self.step.min(Self::SPIN_LIMIT) {
            core::hint::spin_loop();
        }
        if self.step <= Self::SPIN_LIMIT {
            self.step += 1;
        }
    }
}

#[cfg(all(not(loom), test))]
mod test {
    use super::{Relax, SpinBackoff};

    #[test]
    fn backoff_step_saturates() {
        let mut backoff = SpinBackoff::new();
        for _ in 0..32 {
            backoff.relax();
        }
        assert_eq!(backoff.step, SpinBackoff::SPIN_LIMIT + 1);
    }
}
