//! Errors surfaced by the job store contract.

use thiserror::Error;
use trellis_core::{FileId, JobStoreId};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("no such job: {0}")]
    NoSuchJob(JobStoreId),

    #[error("no such file: {0}")]
    NoSuchFile(FileId),

    #[error("no such shared file: {0}")]
    NoSuchSharedFile(String),

    #[error("shared file name {0:?} does not match the allowed pattern")]
    InvalidSharedFileName(String),

    #[error("concurrent modification detected on file {0}")]
    ConcurrentModification(FileId),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
