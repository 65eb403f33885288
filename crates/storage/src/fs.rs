//! Filesystem-backed job store.
//!
//! `update` writes the new record to a sibling temp file in the same
//! directory and renames it over the target, which POSIX guarantees is
//! atomic: a concurrent `load` observes either the old or the new record,
//! never a partial write. This mirrors the rename-based rotation the
//! daemon's own snapshot persistence uses for its whole-state backups,
//! narrowed here to a single record per file.

use crate::error::StorageError;
use crate::job_store::JobStore;
use crate::shared_file::validate_shared_file_name;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use trellis_core::{FileId, JobRecord, JobStoreId, Resources};

/// A job store rooted at a directory on disk.
///
/// Layout:
/// ```text
/// <root>/jobs/<job_store_id>.json
/// <root>/files/<file_id>.bin
/// <root>/files/<file_id>.owner        (contains the owning job id)
/// <root>/shared/<name>
/// <root>/stats_log/<monotonic-name>.blob
/// ```
pub struct FsJobStore {
    root: PathBuf,
}

impl FsJobStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        for sub in ["jobs", "files", "shared", "stats_log"] {
            fs::create_dir_all(root.join(sub))?;
        }
        Ok(Self { root })
    }

    fn job_path(&self, id: JobStoreId) -> PathBuf {
        self.root.join("jobs").join(format!("{id}.json"))
    }

    fn file_path(&self, id: FileId) -> PathBuf {
        self.root.join("files").join(format!("{id}.bin"))
    }

    fn owner_path(&self, id: FileId) -> PathBuf {
        self.root.join("files").join(format!("{id}.owner"))
    }

    fn shared_path(&self, name: &str) -> PathBuf {
        self.root.join("shared").join(name)
    }

    /// Write `bytes` to `path` via a sibling temp file, then rename over
    /// it. Atomic on POSIX filesystems when temp and target share a parent.
    fn atomic_write(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
        let tmp = path.with_extension("tmp");
        {
            let mut f = fs::File::create(&tmp)?;
            f.write_all(bytes)?;
            f.sync_all()?;
        }
        fs::rename(&tmp, path)
    }
}

impl JobStore for FsJobStore {
    fn create(
        &self,
        command: Option<String>,
        resources: Resources,
        predecessor_number: u32,
    ) -> Result<JobRecord, StorageError> {
        let mut record = JobRecord::new(JobStoreId::new(), command, resources);
        record.predecessor_number = predecessor_number;
        self.update(&record)?;
        Ok(record)
    }

    fn load(&self, id: JobStoreId) -> Result<JobRecord, StorageError> {
        let path = self.job_path(id);
        let bytes = fs::read(&path).map_err(|_| StorageError::NoSuchJob(id))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn update(&self, record: &JobRecord) -> Result<(), StorageError> {
        let path = self.job_path(record.job_store_id);
        let bytes = serde_json::to_vec_pretty(record)?;
        Self::atomic_write(&path, &bytes)?;
        Ok(())
    }

    fn delete(&self, id: JobStoreId) -> Result<(), StorageError> {
        let path = self.job_path(id);
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        let owned = self.owned_files(id)?;
        for file_id in owned {
            self.delete_file(file_id)?;
        }
        Ok(())
    }

    fn exists(&self, id: JobStoreId) -> bool {
        self.job_path(id).is_file()
    }

    fn jobs(&self) -> Result<Vec<JobRecord>, StorageError> {
        let dir = self.root.join("jobs");
        let mut out = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if entry.path().extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = fs::read(entry.path())?;
            out.push(serde_json::from_slice(&bytes)?);
        }
        Ok(out)
    }

    fn write_file(&self, job_id: JobStoreId, bytes: &[u8]) -> Result<FileId, StorageError> {
        let id = FileId::new();
        fs::write(self.file_path(id), bytes)?;
        fs::write(self.owner_path(id), job_id.as_str())?;
        Ok(id)
    }

    fn read_file(&self, file_id: FileId) -> Result<Vec<u8>, StorageError> {
        fs::read(self.file_path(file_id)).map_err(|_| StorageError::NoSuchFile(file_id))
    }

    fn update_file(&self, file_id: FileId, bytes: &[u8]) -> Result<(), StorageError> {
        let path = self.file_path(file_id);
        if !path.is_file() {
            return Err(StorageError::NoSuchFile(file_id));
        }
        Self::atomic_write(&path, bytes)?;
        Ok(())
    }

    fn delete_file(&self, file_id: FileId) -> Result<(), StorageError> {
        for path in [self.file_path(file_id), self.owner_path(file_id)] {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn file_exists(&self, file_id: FileId) -> bool {
        self.file_path(file_id).is_file()
    }

    fn empty_file_id(&self, job_id: JobStoreId) -> Result<FileId, StorageError> {
        self.write_file(job_id, &[])
    }

    fn write_file_stream(
        &self,
        job_id: JobStoreId,
        write: &mut dyn FnMut(&mut dyn Write) -> std::io::Result<()>,
    ) -> Result<FileId, StorageError> {
        let id = FileId::new();
        {
            let mut f = fs::File::create(self.file_path(id))?;
            write(&mut f)?;
        }
        fs::write(self.owner_path(id), job_id.as_str())?;
        Ok(id)
    }

    fn read_file_stream(
        &self,
        file_id: FileId,
        read: &mut dyn FnMut(&mut dyn Read) -> std::io::Result<()>,
    ) -> Result<(), StorageError> {
        let path = self.file_path(file_id);
        let mut f = fs::File::open(&path).map_err(|_| StorageError::NoSuchFile(file_id))?;
        read(&mut f)?;
        Ok(())
    }

    fn write_shared_file(&self, name: &str, bytes: &[u8]) -> Result<(), StorageError> {
        validate_shared_file_name(name)?;
        Self::atomic_write(&self.shared_path(name), bytes)?;
        Ok(())
    }

    fn read_shared_file(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        validate_shared_file_name(name)?;
        fs::read(self.shared_path(name))
            .map_err(|_| StorageError::NoSuchSharedFile(name.to_string()))
    }

    fn write_stats_and_logging(&self, blob: &[u8]) -> Result<(), StorageError> {
        let name = format!("{}.blob", nanoid::nanoid!(16));
        fs::write(self.root.join("stats_log").join(name), blob)?;
        Ok(())
    }

    fn read_stats_and_logging(
        &self,
        callback: &mut dyn FnMut(&[u8]),
    ) -> Result<usize, StorageError> {
        let dir = self.root.join("stats_log");
        let mut entries: Vec<PathBuf> = fs::read_dir(&dir)?.filter_map(|e| e.ok()).map(|e| e.path()).collect();
        entries.sort();
        for path in &entries {
            let bytes = fs::read(path)?;
            callback(&bytes);
            fs::remove_file(path)?;
        }
        Ok(entries.len())
    }
}

impl FsJobStore {
    fn owned_files(&self, job_id: JobStoreId) -> Result<Vec<FileId>, StorageError> {
        let dir = self.root.join("files");
        let mut owned = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("owner") {
                continue;
            }
            let owner = fs::read_to_string(&path)?;
            if owner == job_id.as_str() {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    owned.push(FileId::from_string(stem));
                }
            }
        }
        Ok(owned)
    }
}

#[cfg(test)]
#[path = "fs_tests.rs"]
mod tests;
