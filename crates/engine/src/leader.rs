//! The leader's main loop: drains the ready set, dispatches to the batch
//! system, awaits completions, and runs rescue policies when idle.

use crate::batcher::Batcher;
use crate::error::EngineError;
use crate::scheduler_state::{self, SchedulerState};
use std::time::Duration;
use trellis_adapters::BatchSystem;
use trellis_core::{Clock, Config, JobRecord, JobStoreId, Resources};
use trellis_storage::JobStore;

const COMPLETION_POLL: Duration = Duration::from_secs(10);

/// Run the leader loop to completion. Returns the number of jobs that
/// failed terminally; zero means every reachable job succeeded.
pub async fn run(
    store: &dyn JobStore,
    batch_system: &dyn BatchSystem,
    config: &Config,
    clock: &impl Clock,
) -> Result<u32, EngineError> {
    let root = config.root_job.ok_or(EngineError::MissingRootJob)?;
    let mut state = scheduler_state::reconstruct(store, root)?;
    let mut batcher = Batcher::new(batch_system);
    let mut total_failed: u32 = 0;
    let mut last_rescue = clock.now();

    loop {
        let ready: Vec<JobStoreId> = state.ready.drain(..).collect();
        for job_store_id in ready {
            drain_ready_job(store, &mut state, &mut batcher, job_store_id, &mut total_failed).await?;
        }

        if batcher.outstanding() == 0 {
            return Ok(total_failed);
        }

        if let Some((batch_job_id, exit_code)) = batcher.await_completion(COMPLETION_POLL).await {
            handle_completion(store, &mut state, &mut batcher, batch_job_id, exit_code, &mut total_failed).await?;
            continue;
        }

        let min_interval = Duration::from_secs(config.rescue_jobs_frequency_secs);
        if clock.now().duration_since(last_rescue) < min_interval {
            continue;
        }
        last_rescue = clock.now();

        let max_duration = Duration::from_secs(config.max_job_duration_secs);
        for job_store_id in batcher.rescue_over_long(max_duration).await? {
            fail_and_maybe_retry(store, &mut state, job_store_id, &mut total_failed).await?;
        }
        for job_store_id in batcher.rescue_missing(config.rescue_miss_threshold).await? {
            fail_and_maybe_retry(store, &mut state, job_store_id, &mut total_failed).await?;
        }
    }
}

/// §4.4(a): issue a command, progress a successor phase, or clean up a
/// terminal record.
async fn drain_ready_job(
    store: &dyn JobStore,
    state: &mut SchedulerState,
    batcher: &mut Batcher<'_>,
    job_store_id: JobStoreId,
    total_failed: &mut u32,
) -> Result<(), EngineError> {
    let mut record = store.load(job_store_id)?;

    if let Some(command) = record.command.clone() {
        if record.remaining_retry_count > 0 {
            batcher.issue(job_store_id, command, record.resources).await?;
        } else {
            finish_as_failed(store, &record, total_failed)?;
        }
        return Ok(());
    }

    if let Some(top) = record.pop_phase() {
        state.successor_counts.insert(job_store_id, top.len() as u32);
        store.update(&record)?;

        for descriptor in &top {
            state
                .successor_predecessors
                .entry(descriptor.successor_job_store_id)
                .or_default()
                .push(job_store_id);

            match descriptor.predecessor_id {
                Some(predecessor_id) => {
                    let mut successor = store.load(descriptor.successor_job_store_id)?;
                    let joined = successor.record_predecessor_finished(predecessor_id);
                    store.update(&successor)?;
                    if joined {
                        state.ready.insert(descriptor.successor_job_store_id);
                    }
                }
                None => {
                    state.ready.insert(descriptor.successor_job_store_id);
                }
            }
        }
        return Ok(());
    }

    // The record has no command and no successors left: it already ran (or
    // never had work), nothing left but to clean up its files.
    batcher.issue(job_store_id, trellis_worker::deletion_command(job_store_id), Resources::default()).await?;
    Ok(())
}

/// §4.4(c): a completion arrived. If the record still exists the worker
/// did not finish committing its graph — treat it as a failed attempt. If
/// it is gone, the worker succeeded terminally: decrement the predecessor
/// counts it was blocking.
async fn handle_completion(
    store: &dyn JobStore,
    state: &mut SchedulerState,
    batcher: &mut Batcher<'_>,
    batch_job_id: trellis_core::BatchJobId,
    exit_code: i32,
    total_failed: &mut u32,
) -> Result<(), EngineError> {
    let Some(job_store_id) = batcher.complete(batch_job_id) else {
        return Ok(());
    };

    if !store.exists(job_store_id) {
        // A deletion job completed: the record and its files are gone.
        complete_successor(state, job_store_id);
        return Ok(());
    }

    let record = store.load(job_store_id)?;

    if exit_code == 0 {
        // The worker cleared `command` and committed whatever successors it
        // declared (possibly none). Either way the record needs another
        // pass through `drain_ready_job` to issue its next phase or, if
        // terminal, its deletion job.
        state.ready.insert(job_store_id);
        return Ok(());
    }

    if let Some(log_file_id) = record.log_job_store_file_id {
        if let Ok(bytes) = store.read_file(log_file_id) {
            tracing::warn!(%job_store_id, log = %String::from_utf8_lossy(&bytes), "job failed, replaying log");
        }
    }
    fail_and_maybe_retry(store, state, job_store_id, total_failed).await
}

fn complete_successor(state: &mut SchedulerState, job_store_id: JobStoreId) {
    let Some(parents) = state.successor_predecessors.remove(&job_store_id) else {
        return;
    };
    for parent in parents {
        if let Some(count) = state.successor_counts.get_mut(&parent) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                state.successor_counts.remove(&parent);
                state.ready.insert(parent);
            }
        }
    }
}

/// §4.5: decrement the retry budget; re-ready the job if it can still be
/// reissued, otherwise finish it as a terminal failure.
async fn fail_and_maybe_retry(
    store: &dyn JobStore,
    state: &mut SchedulerState,
    job_store_id: JobStoreId,
    total_failed: &mut u32,
) -> Result<(), EngineError> {
    let Ok(mut record) = store.load(job_store_id) else {
        // Already gone (e.g. a deletion job that actually succeeded before
        // the rescue policy decided it looked missing).
        return Ok(());
    };

    if record.remaining_retry_count == 0 {
        finish_as_failed(store, &record, total_failed)?;
        return Ok(());
    }

    record.remaining_retry_count -= 1;
    store.update(&record)?;
    state.ready.insert(job_store_id);
    Ok(())
}

fn finish_as_failed(store: &dyn JobStore, record: &JobRecord, total_failed: &mut u32) -> Result<(), EngineError> {
    *total_failed += 1;
    tracing::error!(job_store_id = %record.job_store_id, "job failed terminally, retries exhausted");
    store.delete(record.job_store_id)?;
    Ok(())
}

#[cfg(test)]
#[path = "leader_tests.rs"]
mod tests;
