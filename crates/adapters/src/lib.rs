#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! trellis-adapters: the batch system contract and a local, single-process
//! implementation of it.

pub mod batch_system;
pub mod in_process;
pub mod local;

pub use batch_system::{BatchSystem, BatchSystemError};
pub use in_process::{DispatchHandler, InProcessBatchSystem};
pub use local::LocalBatchSystem;
