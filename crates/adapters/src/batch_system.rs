//! The batch system contract the scheduler core depends on.
//!
//! Concrete cluster backends (a Mesos-like framework, a cluster queue) are
//! external collaborators; this crate carries only the contract and a
//! single-process implementation used for local execution and tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use trellis_core::{BatchJobId, Resources};

#[derive(Debug, Error)]
pub enum BatchSystemError {
    #[error("no scheduler driver is running")]
    NoDriver,
    #[error("batch job {0} is not known to this batch system")]
    UnknownJob(BatchJobId),
}

#[async_trait]
pub trait BatchSystem: Send + Sync {
    /// Submit `command` with the given resource request; returns a fresh id.
    async fn issue_batch_job(
        &self,
        command: String,
        resources: Resources,
    ) -> Result<BatchJobId, BatchSystemError>;

    /// Block until every id has reached a terminal state.
    async fn kill_batch_jobs(&self, ids: &[BatchJobId]) -> Result<(), BatchSystemError>;

    /// Ids currently issued: queued or running.
    async fn issued_batch_job_ids(&self) -> Vec<BatchJobId>;

    /// Ids currently running, mapped to how long they have been running.
    async fn running_batch_job_ids(&self) -> HashMap<BatchJobId, Duration>;

    /// Wait up to `max_wait` for a completion; `None` on timeout.
    async fn get_updated_batch_job(&self, max_wait: Duration) -> Option<(BatchJobId, i32)>;

    async fn shutdown(&self);
}
