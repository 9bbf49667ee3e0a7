//! Development-time tracing for debugging pipeline runs.
//!
//! Diagnostics go to stderr and are controlled by `RUST_LOG`. They are never part
//! of the product output, which is the JSON printed on stdout by the CLI.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`, defaulting to `warn`.
///
/// # Example
/// ```bash
/// RUST_LOG=transpipe=debug transpipe compare --impl-a a.cpp --impl-b b.py --tests-a ta.cpp --tests-b tb.py
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
