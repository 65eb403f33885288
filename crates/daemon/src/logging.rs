//! Installs the process-wide `tracing` subscriber.
//!
//! The only process-wide state this crate introduces is the logger; every
//! other piece of state (the job store, the batcher, the scheduler) is
//! passed explicitly rather than reached for through globals.

use tracing_subscriber::EnvFilter;

/// Install an `EnvFilter`-based subscriber writing to stderr, configurable
/// via `RUST_LOG`. Defaults to `info` when unset.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}
