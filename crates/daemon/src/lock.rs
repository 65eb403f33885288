//! Single-instance guard: an exclusive lock file holding this process's PID.
//!
//! Mirrors the teacher daemon's own lock handling — open (don't truncate)
//! before acquiring the lock, so a failed acquisition never clobbers the
//! PID belonging to the daemon that already holds it.

use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::DaemonError;

/// Held for the lifetime of the daemon process; the lock is released when
/// this value is dropped.
pub struct LockFile {
    #[allow(dead_code)]
    file: File,
}

impl LockFile {
    pub fn acquire(path: &Path) -> Result<Self, DaemonError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().write(true).create(true).truncate(false).open(path)?;
        file.try_lock_exclusive().map_err(|_| DaemonError::LockFailed(path.to_path_buf()))?;

        let mut file = file;
        file.set_len(0)?;
        writeln!(file, "{}", std::process::id())?;

        Ok(Self { file })
    }
}

/// Remove the lock file. Called only after the lock itself has been
/// released (on `LockFile` drop), so this never races the owning daemon.
pub fn remove(path: &PathBuf) {
    if path.exists() {
        let _ = std::fs::remove_file(path);
    }
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
