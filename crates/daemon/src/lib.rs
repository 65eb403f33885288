#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! trellis-daemon: wires the scheduler core into a runnable process —
//! loads the persisted job-store locator, drives the leader loop and the
//! stats/log aggregator concurrently, and maps the result to an exit code.
//!
//! This crate owns no job types of its own (the engine has no opinion on
//! how user jobs express computation); the [`JobRegistry`] an embedder
//! wires up must already know how to construct every tag reachable from
//! the persisted root job.

pub mod config;
pub mod error;
pub mod lock;
pub mod logging;

pub use config::TrellisConfig;
pub use error::DaemonError;

use std::sync::Arc;
use trellis_adapters::InProcessBatchSystem;
use trellis_core::{Config, SystemClock, CONFIG_SHARED_FILE_NAME};
use trellis_storage::{FsJobStore, JobStore};
use trellis_worker::JobRegistry;

/// Open the configured store, run the leader loop to completion alongside
/// the stats/log aggregator, and return the number of terminally failed
/// jobs (0 means complete success).
pub async fn run_daemon(trellis_config: &TrellisConfig, registry: JobRegistry) -> Result<u32, DaemonError> {
    let store = Arc::new(FsJobStore::open(&trellis_config.job_store_root)?);
    let scheduler_config = load_scheduler_config(store.as_ref())?;

    let registry = Arc::new(registry);
    let dispatch_store = Arc::clone(&store);
    let dispatch_registry = Arc::clone(&registry);
    let batch_system = InProcessBatchSystem::new(Arc::new(move |command: &str| {
        trellis_worker::dispatch(dispatch_store.as_ref(), dispatch_registry.as_ref(), command)
    }));

    let (aggregator_handle, aggregator_stop) = trellis_engine::aggregator_signal();
    let aggregator_store = Arc::clone(&store);
    let aggregator_task = tokio::spawn(async move {
        trellis_engine::run_aggregator(aggregator_store.as_ref(), aggregator_stop, SystemClock).await
    });

    let failed = trellis_engine::run_leader(store.as_ref(), &batch_system, &scheduler_config, &SystemClock).await?;

    aggregator_handle.stop();
    aggregator_task.await.map_err(|e| std::io::Error::other(e.to_string()))??;

    Ok(failed)
}

fn load_scheduler_config(store: &dyn JobStore) -> Result<Config, DaemonError> {
    let bytes = store.read_shared_file(CONFIG_SHARED_FILE_NAME)?;
    let text = String::from_utf8_lossy(&bytes);
    Ok(Config::from_toml(&text)?)
}
