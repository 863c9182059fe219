//! Logging macros that forward to `tracing` when the `tracing` feature is
//! enabled, and expand to nothing otherwise so the lock-coupling hot path
//! carries no logging cost in normal builds.
//!
//! ```bash
//! RUST_LOG=concurrent_btree=trace cargo test --features tracing concurrent
//! ```

#![allow(unused_macros, unused_imports)]

/// Trace-level event. Compiles to nothing without the `tracing` feature.
#[cfg(feature = "tracing")]
macro_rules! trace_log {
    ($($arg:tt)*) => {
        tracing::trace!($($arg)*)
    };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_log {
    ($($arg:tt)*) => {};
}

/// Debug-level event. Compiles to nothing without the `tracing` feature.
#[cfg(feature = "tracing")]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        tracing::debug!($($arg)*)
    };
}

#[cfg(not(feature = "tracing"))]
macro_rules! debug_log {
    ($($arg:tt)*) => {};
}

pub(crate) use debug_log;
pub(crate) use trace_log;
