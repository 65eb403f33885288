//! In-memory job store. Backs unit tests and same-process demos.

use crate::error::StorageError;
use crate::job_store::JobStore;
use crate::shared_file::validate_shared_file_name;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::Cursor;
use trellis_core::{FileId, JobRecord, JobStoreId, Resources};

#[derive(Default)]
struct Inner {
    jobs: HashMap<JobStoreId, JobRecord>,
    files: HashMap<FileId, Vec<u8>>,
    file_owners: HashMap<FileId, JobStoreId>,
    shared_files: HashMap<String, Vec<u8>>,
    stats_log: Vec<Vec<u8>>,
}

/// A job store backed by an in-process map, guarded by a single lock.
///
/// `update` is atomic simply because the whole map is behind one mutex;
/// there is no partial-write window to observe.
pub struct MemoryJobStore {
    inner: Mutex<Inner>,
}

impl Default for MemoryJobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self { inner: Mutex::new(Inner::default()) }
    }
}

impl JobStore for MemoryJobStore {
    fn create(
        &self,
        command: Option<String>,
        resources: Resources,
        predecessor_number: u32,
    ) -> Result<JobRecord, StorageError> {
        let mut record = JobRecord::new(JobStoreId::new(), command, resources);
        record.predecessor_number = predecessor_number;
        let mut inner = self.inner.lock();
        inner.jobs.insert(record.job_store_id, record.clone());
        Ok(record)
    }

    fn load(&self, id: JobStoreId) -> Result<JobRecord, StorageError> {
        self.inner.lock().jobs.get(&id).cloned().ok_or(StorageError::NoSuchJob(id))
    }

    fn update(&self, record: &JobRecord) -> Result<(), StorageError> {
        self.inner.lock().jobs.insert(record.job_store_id, record.clone());
        Ok(())
    }

    fn delete(&self, id: JobStoreId) -> Result<(), StorageError> {
        let mut inner = self.inner.lock();
        inner.jobs.remove(&id);
        let owned: Vec<FileId> =
            inner.file_owners.iter().filter(|(_, owner)| **owner == id).map(|(f, _)| *f).collect();
        for file_id in owned {
            inner.files.remove(&file_id);
            inner.file_owners.remove(&file_id);
        }
        Ok(())
    }

    fn exists(&self, id: JobStoreId) -> bool {
        self.inner.lock().jobs.contains_key(&id)
    }

    fn jobs(&self) -> Result<Vec<JobRecord>, StorageError> {
        Ok(self.inner.lock().jobs.values().cloned().collect())
    }

    fn write_file(&self, job_id: JobStoreId, bytes: &[u8]) -> Result<FileId, StorageError> {
        let id = FileId::new();
        let mut inner = self.inner.lock();
        inner.files.insert(id, bytes.to_vec());
        inner.file_owners.insert(id, job_id);
        Ok(id)
    }

    fn read_file(&self, file_id: FileId) -> Result<Vec<u8>, StorageError> {
        self.inner.lock().files.get(&file_id).cloned().ok_or(StorageError::NoSuchFile(file_id))
    }

    fn update_file(&self, file_id: FileId, bytes: &[u8]) -> Result<(), StorageError> {
        let mut inner = self.inner.lock();
        let slot = inner.files.get_mut(&file_id).ok_or(StorageError::NoSuchFile(file_id))?;
        *slot = bytes.to_vec();
        Ok(())
    }

    fn delete_file(&self, file_id: FileId) -> Result<(), StorageError> {
        let mut inner = self.inner.lock();
        inner.files.remove(&file_id);
        inner.file_owners.remove(&file_id);
        Ok(())
    }

    fn file_exists(&self, file_id: FileId) -> bool {
        self.inner.lock().files.contains_key(&file_id)
    }

    fn empty_file_id(&self, job_id: JobStoreId) -> Result<FileId, StorageError> {
        self.write_file(job_id, &[])
    }

    fn write_file_stream(
        &self,
        job_id: JobStoreId,
        write: &mut dyn FnMut(&mut dyn std::io::Write) -> std::io::Result<()>,
    ) -> Result<FileId, StorageError> {
        let mut buf = Cursor::new(Vec::new());
        write(&mut buf)?;
        self.write_file(job_id, &buf.into_inner())
    }

    fn read_file_stream(
        &self,
        file_id: FileId,
        read: &mut dyn FnMut(&mut dyn std::io::Read) -> std::io::Result<()>,
    ) -> Result<(), StorageError> {
        let bytes = self.read_file(file_id)?;
        let mut cursor = Cursor::new(bytes);
        read(&mut cursor)?;
        Ok(())
    }

    fn write_shared_file(&self, name: &str, bytes: &[u8]) -> Result<(), StorageError> {
        validate_shared_file_name(name)?;
        self.inner.lock().shared_files.insert(name.to_string(), bytes.to_vec());
        Ok(())
    }

    fn read_shared_file(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        validate_shared_file_name(name)?;
        self.inner
            .lock()
            .shared_files
            .get(name)
            .cloned()
            .ok_or_else(|| StorageError::NoSuchSharedFile(name.to_string()))
    }

    fn write_stats_and_logging(&self, blob: &[u8]) -> Result<(), StorageError> {
        self.inner.lock().stats_log.push(blob.to_vec());
        Ok(())
    }

    fn read_stats_and_logging(
        &self,
        callback: &mut dyn FnMut(&[u8]),
    ) -> Result<usize, StorageError> {
        let drained = std::mem::take(&mut self.inner.lock().stats_log);
        let count = drained.len();
        for blob in &drained {
            callback(blob);
        }
        Ok(count)
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
