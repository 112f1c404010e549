//! Log output setup for binaries and benchmarks embedding the pipeline.

use tracing_subscriber::EnvFilter;

/// Install a formatted subscriber filtered by `RUST_LOG` (default `info`).
///
/// Calls after the first one leave the installed subscriber in place.
pub fn init() {
    init_with_default("info");
}

/// Same as [`init`] with a caller-chosen fallback filter.
pub fn init_with_default(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
