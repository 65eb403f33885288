//! Persisted scheduler tunables, stored as a shared file in the job store.
//!
//! Despite the legacy filename (`config.xml`, retained for continuity with
//! prior tooling), the document is serialized with `toml`.

use crate::id::JobStoreId;
use serde::{Deserialize, Serialize};

/// Name of the shared file this document lives under.
pub const CONFIG_SHARED_FILE_NAME: &str = "config.xml";

/// Scheduler-wide tunables that travel with the job store rather than the
/// daemon process, so a worker reconstructing the store from its locator
/// sees the same values the leader used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Opaque locator a worker uses to reconnect to the job store.
    pub job_store: String,
    /// Default retry budget assigned to a job when it does not specify one.
    pub try_count: u32,
    pub default_memory: u64,
    pub default_cpu: u64,
    pub default_disk: u64,
    /// Expected wall-clock time for one job, in seconds; informs the
    /// over-long rescue threshold.
    pub job_time_secs: u64,
    /// Hard ceiling before a running job is killed by the over-long rescue.
    pub max_job_duration_secs: u64,
    /// Minimum interval between rescue passes.
    pub rescue_jobs_frequency_secs: u64,
    /// Consecutive misses before the missing-job rescue kills a job.
    pub rescue_miss_threshold: u32,
    /// Set once the first job is persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_job: Option<JobStoreId>,
}

impl Config {
    pub fn new(job_store: impl Into<String>) -> Self {
        Self {
            job_store: job_store.into(),
            try_count: 3,
            default_memory: 2 * 1024 * 1024 * 1024,
            default_cpu: 1000,
            default_disk: 2 * 1024 * 1024 * 1024,
            job_time_secs: 30,
            max_job_duration_secs: 10 * 30,
            rescue_jobs_frequency_secs: 5 * 30,
            rescue_miss_threshold: 3,
            root_job: None,
        }
    }

    crate::setters! {
        set { try_count: u32 }
        set { default_memory: u64 }
        set { default_cpu: u64 }
        set { default_disk: u64 }
        set { job_time_secs: u64 }
        set { max_job_duration_secs: u64 }
        set { rescue_jobs_frequency_secs: u64 }
        set { rescue_miss_threshold: u32 }
        option { root_job: JobStoreId }
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    pub fn from_toml(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
