#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! trellis-engine: the leader side of the scheduler — reconstructs
//! in-memory state from the job store, bridges decisions to a batch
//! system, drives the main loop to completion, and aggregates per-job
//! stats/log output in the background.

pub mod batcher;
pub mod error;
pub mod leader;
pub mod scheduler_state;
pub mod stats_aggregator;

pub use batcher::Batcher;
pub use error::EngineError;
pub use leader::run as run_leader;
pub use scheduler_state::{cleanup, reconstruct, SchedulerState};
pub use stats_aggregator::{
    run as run_aggregator, signal as aggregator_signal, AggregatorHandle, STATS_SHARED_FILE_NAME,
};
