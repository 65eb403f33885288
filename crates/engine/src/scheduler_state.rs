//! Reconstructs the leader's in-memory scheduling frontier from the
//! persisted graph: the cleanup pass (reconciling torn records and pruning
//! dead successors) followed by a walk from the root job.

use crate::error::EngineError;
use indexmap::IndexSet;
use std::collections::{HashMap, HashSet};
use trellis_core::JobStoreId;
use trellis_storage::JobStore;

/// The leader's working set, rebuilt from the store on every startup.
#[derive(Debug, Default)]
pub struct SchedulerState {
    /// Jobs the leader may issue right now.
    pub ready: IndexSet<JobStoreId>,
    /// For a parent not yet fully drained, how many successors in its
    /// current top phase are still unfinished.
    pub successor_counts: HashMap<JobStoreId, u32>,
    /// Reverse index: successor -> parents waiting on it, used to decrement
    /// `successor_counts` on completion.
    pub successor_predecessors: HashMap<JobStoreId, Vec<JobStoreId>>,
}

/// Reconcile torn records, then rebuild scheduling state from `root`.
pub fn reconstruct(store: &dyn JobStore, root: JobStoreId) -> Result<SchedulerState, EngineError> {
    cleanup(store)?;
    build(store, root)
}

/// Delete every id mentioned in any record's `jobs_to_delete`, then prune
/// dead successor descriptors and stale bookkeeping from every surviving
/// record.
pub fn cleanup(store: &dyn JobStore) -> Result<(), EngineError> {
    let jobs = store.jobs()?;

    let mut to_delete: HashSet<JobStoreId> = HashSet::new();
    for job in &jobs {
        to_delete.extend(job.jobs_to_delete.iter().copied());
    }
    for id in &to_delete {
        store.delete(*id)?;
    }

    for mut job in jobs {
        if to_delete.contains(&job.job_store_id) {
            continue;
        }

        let mut changed = false;

        if !job.jobs_to_delete.is_empty() {
            job.jobs_to_delete.clear();
            changed = true;
        }

        if job.log_job_store_file_id.take().is_some() {
            changed = true;
        }

        for phase in job.stack.iter_mut() {
            let before = phase.len();
            phase.retain(|descriptor| store.exists(descriptor.successor_job_store_id));
            if phase.len() != before {
                changed = true;
            }
        }

        while job.stack.last().is_some_and(|phase| phase.is_empty()) {
            job.stack.pop();
            changed = true;
        }

        if changed {
            store.update(&job)?;
        }
    }

    Ok(())
}

/// Walk the graph from `root`, classifying every reachable job as ready
/// (has a command to run, or is terminal) or waiting (on its current top
/// phase's successors). A multi-predecessor successor is recursed into
/// only the first time it is reached; every reference to it still
/// contributes a predecessor link.
fn build(store: &dyn JobStore, root: JobStoreId) -> Result<SchedulerState, EngineError> {
    let mut state = SchedulerState::default();
    let mut visited: HashSet<JobStoreId> = HashSet::new();
    let mut stack = vec![root];

    while let Some(id) = stack.pop() {
        if visited.contains(&id) {
            continue;
        }
        visited.insert(id);

        let record = store.load(id)?;
        if record.command.is_some() || record.stack.is_empty() {
            state.ready.insert(id);
            continue;
        }

        let Some(top) = record.top_phase() else {
            state.ready.insert(id);
            continue;
        };

        state.successor_counts.insert(id, top.len() as u32);
        for descriptor in top {
            state.successor_predecessors.entry(descriptor.successor_job_store_id).or_default().push(id);
            if !visited.contains(&descriptor.successor_job_store_id) {
                stack.push(descriptor.successor_job_store_id);
            }
        }
    }

    Ok(state)
}

#[cfg(test)]
#[path = "scheduler_state_tests.rs"]
mod tests;
