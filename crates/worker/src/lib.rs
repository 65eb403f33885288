#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! trellis-worker: the worker side of job execution — load a job's spec,
//! resolve its promise arguments, run user code, check the graph it
//! declared for cycles, and commit the result back to the store.

pub mod commit;
pub mod context;
pub mod error;
pub mod graph;
pub mod substitute;
pub mod user_job;

pub use commit::{deletion_command, dispatch, run_job, worker_command, JobOutcome};
pub use context::{JobContext, SuccessorDecl};
pub use error::WorkerError;
pub use user_job::{ContextFnJob, FnJob, JobRegistry, JobSpec, UserJob};
