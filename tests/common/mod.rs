//! Shared setup for the integration tests.
//!
//! Logging from the tree itself is only emitted with the `tracing` feature:
//!
//! ```bash
//! RUST_LOG=concurrent_btree=trace cargo test --features tracing --test concurrent
//! ```

#![allow(dead_code)]

use std::sync::Once;

use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Installs a global subscriber filtered by `RUST_LOG` (default `warn`).
/// Only the first call in a test binary has any effect.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_thread_names(true)
            .with_test_writer()
            .try_init();
    });
}

/// Spreads the key space across threads by placing the thread index in the
/// low bits, so that every thread writes a disjoint set of keys.
pub fn unique_key(key: u64, low_bits: u64, concurrency: usize) -> u64 {
    let shift = concurrency.next_power_of_two().trailing_zeros();
    (key << shift) | low_bits
}
