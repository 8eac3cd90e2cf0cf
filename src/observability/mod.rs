//! Observability: structured logging setup and authentication counters.
//!
//! Library code only emits `tracing` events and `metrics` counters.
//! Installing a subscriber or recorder is left to the binary.

pub mod metrics;
#[cfg(feature = "logging")]
mod tracing_init;

#[cfg(feature = "logging")]
pub use tracing_init::*;
