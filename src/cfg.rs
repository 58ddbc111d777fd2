pub mod atomic {
    #[cfg(not(all(loom, test)))]
    pub use core::sync::atomic::AtomicU32;

    #[cfg(all(loom, test))]
    pub use loom::sync::atomic::AtomicU32;
}

#[cfg(any(feature = "yield", test))]
pub mod thread {
    #[cfg(not(all(loom, test)))]
    pub use std::thread::yield_now;

    #[cfg(all(loom, test))]
    pub use loom::thread::yield_now;
}

/// Emits a `log::trace!` record when the `log` feature is enabled, expands
/// to nothing otherwise.
///
/// Only ever invoked on paths that are about to enter or leave the kernel,
/// so the uncontended fast path never pays for it.
macro_rules! trace {
    ($($arg:tt)+) => {{
        #[cfg(feature = "log")]
        {
            ::log::trace!(target: "futexlock", $($arg)+);
        }
    }};
}

pub(crate) use trace;
