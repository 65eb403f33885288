//! The job store contract: the single source of truth for job records and
//! job-owned/shared files.
//!
//! Implementations must make [`JobStore::update`] atomic per record: a
//! concurrent [`JobStore::load`] must observe either the prior record or
//! the new one in full, never a partial write.

use crate::error::StorageError;
use std::io::{Read, Write};
use trellis_core::{FileId, JobRecord, JobStoreId, Resources};

pub trait JobStore: Send + Sync {
    /// Assign a fresh id and persist a new record.
    fn create(
        &self,
        command: Option<String>,
        resources: Resources,
        predecessor_number: u32,
    ) -> Result<JobRecord, StorageError>;

    fn load(&self, id: JobStoreId) -> Result<JobRecord, StorageError>;

    /// Atomically replace the persisted record for `record.job_store_id`.
    fn update(&self, record: &JobRecord) -> Result<(), StorageError>;

    /// Idempotent: succeeds even if `id` is already absent.
    fn delete(&self, id: JobStoreId) -> Result<(), StorageError>;

    fn exists(&self, id: JobStoreId) -> bool;

    /// Full-store iteration. Used only by the cleanup pass.
    fn jobs(&self) -> Result<Vec<JobRecord>, StorageError>;

    /// Persist `bytes` as a new file owned by `job_id`.
    fn write_file(&self, job_id: JobStoreId, bytes: &[u8]) -> Result<FileId, StorageError>;

    fn read_file(&self, file_id: FileId) -> Result<Vec<u8>, StorageError>;

    /// Replace the contents of an existing file. Fails with
    /// [`StorageError::NoSuchFile`] if `file_id` is unknown.
    fn update_file(&self, file_id: FileId, bytes: &[u8]) -> Result<(), StorageError>;

    /// Idempotent.
    fn delete_file(&self, file_id: FileId) -> Result<(), StorageError>;

    fn file_exists(&self, file_id: FileId) -> bool;

    /// Allocate an empty file owned by `job_id` (used to pre-assign a
    /// promise's file id before its producer has run).
    fn empty_file_id(&self, job_id: JobStoreId) -> Result<FileId, StorageError>;

    /// Stream-write a file owned by `job_id`. The writer handle passed to
    /// `write` is closed on every exit path, including an `Err` return.
    fn write_file_stream(
        &self,
        job_id: JobStoreId,
        write: &mut dyn FnMut(&mut dyn Write) -> std::io::Result<()>,
    ) -> Result<FileId, StorageError>;

    /// Stream-read a file. The reader handle passed to `read` is closed on
    /// every exit path.
    fn read_file_stream(
        &self,
        file_id: FileId,
        read: &mut dyn FnMut(&mut dyn Read) -> std::io::Result<()>,
    ) -> Result<(), StorageError>;

    /// Write a named shared file not owned by any job. `name` must match
    /// [`crate::shared_file::validate_shared_file_name`].
    fn write_shared_file(&self, name: &str, bytes: &[u8]) -> Result<(), StorageError>;

    fn read_shared_file(&self, name: &str) -> Result<Vec<u8>, StorageError>;

    /// Append one stats/log blob to the drain channel.
    fn write_stats_and_logging(&self, blob: &[u8]) -> Result<(), StorageError>;

    /// Drain every blob written since the last successful drain, invoking
    /// `callback` once per blob in write order, then clear the channel.
    /// Returns the number of blobs drained.
    fn read_stats_and_logging(
        &self,
        callback: &mut dyn FnMut(&[u8]),
    ) -> Result<usize, StorageError>;
}
