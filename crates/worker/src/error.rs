//! Errors surfaced by worker-side graph expansion.

use thiserror::Error;
use trellis_core::{JobStoreId, PromiseError};
use trellis_storage::StorageError;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Promise(#[from] PromiseError),

    #[error("no user job type registered for tag {0:?}")]
    UnknownTag(String),

    #[error("job {0} has no job_spec_file_id to load")]
    MissingJobSpec(JobStoreId),

    #[error("user job function was not wired for this process")]
    MissingFunction,

    #[error("a follow-on would create a cycle in the augmented job graph")]
    CycleDetected,

    #[error("job returned a bare PromiseReference, which cannot outlive its producer")]
    ReturnedBarePromise,

    #[error("promise slot nests a container more than one level deep")]
    NestedContainerTooDeep,

    #[error("promise index {index} out of range for producer return value")]
    PromiseIndexOutOfRange { index: u32 },

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
