#![doc = include_str!("../README.md")]
#![deny(missing_docs)]
#![warn(clippy::nursery, clippy::pedantic)]

//! Test utilities for the CCV keepers

pub mod fixtures;
pub mod mock_host;
pub mod registry;

pub use mock_host::MockIbcHost;
pub use registry::MockRegistry;

/// Routes `tracing` events to the test output, honouring `RUST_LOG`.
///
/// Safe to call from every test; only the first call installs the subscriber.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
