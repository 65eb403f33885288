//! Shared-file name validation.
//!
//! Shared files are not owned by any job (the configuration document, the
//! aggregated stats/log document); only their name identifies them.

use crate::error::StorageError;

/// Validate a shared-file name against `^[A-Za-z0-9._-]+$`.
pub fn validate_shared_file_name(name: &str) -> Result<(), StorageError> {
    let valid = !name.is_empty()
        && name.bytes().all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'));
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidSharedFileName(name.to_string()))
    }
}
