//! Daemon-local configuration: where this process's own files live.
//!
//! Distinct from [`trellis_core::Config`], which travels with the job store
//! itself so a worker reconstructing the store from its locator sees the
//! same scheduler tunables the leader used. `TrellisConfig` is read once at
//! startup from a TOML file, then overridable by environment variables.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::DaemonError;

/// `TRELLIS_JOB_STORE` overrides `job_store_root` from the config file.
const ENV_JOB_STORE: &str = "TRELLIS_JOB_STORE";
/// `TRELLIS_LOCK_PATH` overrides `lock_path` from the config file.
const ENV_LOCK_PATH: &str = "TRELLIS_LOCK_PATH";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrellisConfig {
    /// Root directory of the `FsJobStore` this daemon drives to completion.
    pub job_store_root: PathBuf,
    /// Exclusive lock file preventing two daemons from driving the same
    /// store at once. Defaults to a sibling of `job_store_root`.
    #[serde(default)]
    pub lock_path: Option<PathBuf>,
}

impl TrellisConfig {
    /// Load from a TOML file at `path`, then apply environment overrides.
    pub fn load(path: &std::path::Path) -> Result<Self, DaemonError> {
        let text = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&text)?;

        if let Ok(job_store) = std::env::var(ENV_JOB_STORE) {
            config.job_store_root = PathBuf::from(job_store);
        }
        if let Ok(lock_path) = std::env::var(ENV_LOCK_PATH) {
            config.lock_path = Some(PathBuf::from(lock_path));
        }

        Ok(config)
    }

    /// Resolved lock file path: the configured override, or
    /// `<job_store_root>.lock` alongside the store directory.
    pub fn resolved_lock_path(&self) -> PathBuf {
        self.lock_path.clone().unwrap_or_else(|| {
            let mut path = self.job_store_root.clone();
            path.set_extension("lock");
            path
        })
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
