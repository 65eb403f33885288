//! Bridges scheduler decisions to the batch system: tracks which batch job
//! ids correspond to which job records, and runs the two rescue policies.

use crate::error::EngineError;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use trellis_adapters::BatchSystem;
use trellis_core::{BatchJobId, JobStoreId, Resources};

/// Issues jobs to a [`BatchSystem`] and keeps the `batch_job_id ->
/// job_store_id` mapping the leader needs to translate completions back
/// into graph mutations.
pub struct Batcher<'a> {
    batch_system: &'a dyn BatchSystem,
    issued: HashMap<BatchJobId, JobStoreId>,
    miss_counts: HashMap<BatchJobId, u32>,
}

impl<'a> Batcher<'a> {
    pub fn new(batch_system: &'a dyn BatchSystem) -> Self {
        Self { batch_system, issued: HashMap::new(), miss_counts: HashMap::new() }
    }

    pub async fn issue(
        &mut self,
        job_store_id: JobStoreId,
        command: String,
        resources: Resources,
    ) -> Result<BatchJobId, EngineError> {
        let batch_job_id = self.batch_system.issue_batch_job(command, resources).await?;
        self.issued.insert(batch_job_id, job_store_id);
        Ok(batch_job_id)
    }

    /// Jobs currently issued and not yet completed.
    pub fn outstanding(&self) -> usize {
        self.issued.len()
    }

    /// Wait up to `max_wait` for the batch system to report a completion.
    pub async fn await_completion(&self, max_wait: Duration) -> Option<(BatchJobId, i32)> {
        self.batch_system.get_updated_batch_job(max_wait).await
    }

    /// Record that `batch_job_id` completed, returning the job it belongs
    /// to if this batcher issued it.
    pub fn complete(&mut self, batch_job_id: BatchJobId) -> Option<JobStoreId> {
        self.miss_counts.remove(&batch_job_id);
        self.issued.remove(&batch_job_id)
    }

    /// Kill and forget any issued job running longer than `max_duration`.
    /// Returns the job records to fail.
    pub async fn rescue_over_long(&mut self, max_duration: Duration) -> Result<Vec<JobStoreId>, EngineError> {
        let running = self.batch_system.running_batch_job_ids().await;
        let to_kill: Vec<BatchJobId> =
            running.into_iter().filter(|(_, duration)| *duration > max_duration).map(|(id, _)| id).collect();
        self.kill_and_reap(to_kill).await
    }

    /// Diff issued ids against what the batch system still reports; once an
    /// id has been missing for `threshold` consecutive checks, kill it.
    pub async fn rescue_missing(&mut self, threshold: u32) -> Result<Vec<JobStoreId>, EngineError> {
        let known: HashSet<BatchJobId> = self.batch_system.issued_batch_job_ids().await.into_iter().collect();
        let missing: Vec<BatchJobId> = self.issued.keys().copied().filter(|id| !known.contains(id)).collect();
        let missing_set: HashSet<BatchJobId> = missing.iter().copied().collect();

        self.miss_counts.retain(|id, _| missing_set.contains(id));

        let mut to_kill = Vec::new();
        for id in missing {
            let count = self.miss_counts.entry(id).or_insert(0);
            *count += 1;
            if *count >= threshold {
                to_kill.push(id);
            }
        }

        self.kill_and_reap(to_kill).await
    }

    async fn kill_and_reap(&mut self, to_kill: Vec<BatchJobId>) -> Result<Vec<JobStoreId>, EngineError> {
        if to_kill.is_empty() {
            return Ok(Vec::new());
        }
        self.batch_system.kill_batch_jobs(&to_kill).await?;
        Ok(to_kill.into_iter().filter_map(|id| self.complete(id)).collect())
    }
}

#[cfg(test)]
#[path = "batcher_tests.rs"]
mod tests;
