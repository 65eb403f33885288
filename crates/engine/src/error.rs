//! Errors surfaced by the scheduler core: state reconstruction, batching,
//! and the leader loop.

use thiserror::Error;
use trellis_adapters::BatchSystemError;
use trellis_core::BatchJobId;
use trellis_storage::StorageError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    BatchSystem(#[from] BatchSystemError),

    #[error("batch job {0} is not tracked by this scheduler run")]
    UnknownBatchJob(BatchJobId),

    #[error("config has no root_job set; nothing to schedule")]
    MissingRootJob,
}
