//! Worker-side graph expansion: runs a job, checks the augmented graph for
//! cycles, stores vended promise values, and commits new successors to the
//! store via the two-phase `jobs_to_delete` protocol.

use crate::context::{JobContext, SuccessorDecl};
use crate::error::WorkerError;
use crate::graph::check_augmented_graph_acyclic;
use crate::substitute::resolve_promise_slots;
use crate::user_job::{JobRegistry, JobSpec};
use indexmap::IndexSet;
use trellis_core::{JobRecord, JobReturn, JobStoreId, StackPhase, SuccessorDescriptor};
use trellis_storage::JobStore;

/// What a single worker invocation produced, for the caller (the batch
/// system dispatch closure, or a standalone worker binary) to report.
#[derive(Debug)]
pub struct JobOutcome {
    pub return_value: JobReturn,
    pub children: Vec<JobStoreId>,
    pub follow_ons: Vec<JobStoreId>,
}

/// Command string a real batch system is asked to execute to run a job:
/// reconstructible by a worker entry point as `run <id>`.
pub fn worker_command(job_store_id: JobStoreId) -> String {
    format!("run {job_store_id}")
}

/// Command string asked to clean up and delete a terminal record that has
/// no work and no successors left — a job whose own `run` already
/// happened, issued once more so the deletion happens wherever the job
/// store's files actually live.
pub fn deletion_command(job_store_id: JobStoreId) -> String {
    format!("delete {job_store_id}")
}

enum Command {
    Run(JobStoreId),
    Delete(JobStoreId),
}

fn parse_command(command: &str) -> Option<Command> {
    let mut parts = command.split_whitespace();
    let kind = parts.next()?;
    let id = parts.next()?;
    match kind {
        "run" => Some(Command::Run(JobStoreId::from_string(id))),
        "delete" => Some(Command::Delete(JobStoreId::from_string(id))),
        _ => None,
    }
}

/// Entry point a worker process (or an in-process batch system handler)
/// calls with the command string a job record carries. Returns the exit
/// code the batch system should report.
pub fn dispatch(store: &dyn JobStore, registry: &JobRegistry, command: &str) -> i32 {
    match parse_command(command) {
        Some(Command::Run(job_store_id)) => match run_job(store, registry, job_store_id) {
            Ok(_) => 0,
            Err(err) => {
                tracing::error!(%err, %job_store_id, "job failed");
                record_failure_log(store, job_store_id, &err);
                1
            }
        },
        Some(Command::Delete(job_store_id)) => match store.delete(job_store_id) {
            Ok(()) => 0,
            Err(err) => {
                tracing::error!(%err, %job_store_id, "deletion failed");
                1
            }
        },
        None => {
            tracing::error!(command, "unrecognized worker command");
            1
        }
    }
}

/// Best-effort: persist `err`'s message as the job's failure log so the
/// leader can replay it to the operator on the next completion. Swallows
/// its own storage errors — a failed job that also can't be logged should
/// still report its original exit code.
fn record_failure_log(store: &dyn JobStore, job_store_id: JobStoreId, err: &WorkerError) {
    let Ok(mut record) = store.load(job_store_id) else { return };
    if let Ok(file_id) = store.write_file(job_store_id, err.to_string().as_bytes()) {
        record.log_job_store_file_id = Some(file_id);
        let _ = store.update(&record);
    }
}

/// Execute one job end to end: load its spec, resolve promise slots, run
/// user code, and commit whatever graph it declared. Returns `Err` for any
/// failure — user-job panics aside, this is the only signal the leader
/// needs to decrement the retry budget.
pub fn run_job(
    store: &dyn JobStore,
    registry: &JobRegistry,
    job_store_id: JobStoreId,
) -> Result<JobOutcome, WorkerError> {
    let mut record = store.load(job_store_id)?;
    let spec_file_id =
        record.job_spec_file_id.ok_or(WorkerError::MissingJobSpec(job_store_id))?;
    let bytes = store.read_file(spec_file_id)?;
    let spec: JobSpec = serde_json::from_slice(&bytes)?;

    let mut job = registry.construct(&spec.tag, spec.payload)?;
    resolve_promise_slots(store, job.promise_slots())?;

    let mut ctx = JobContext::new(store, job_store_id);
    let return_value = job.run(&mut ctx)?;
    if returned_a_bare_promise(&return_value) {
        return Err(WorkerError::ReturnedBarePromise);
    }

    let (own_promise_file_id, children, follow_ons, detached, log_messages) = ctx.into_parts();

    let child_ids: Vec<JobStoreId> = children.iter().map(SuccessorDecl::job_store_id).collect();
    let follow_on_ids: Vec<JobStoreId> = follow_ons.iter().map(SuccessorDecl::job_store_id).collect();
    check_augmented_graph_acyclic(store, job_store_id, &child_ids, &follow_on_ids)?;

    if let Some(file_id) = own_promise_file_id {
        store.update_file(file_id, &serde_json::to_vec(&return_value)?)?;
    }

    if !log_messages.is_empty() {
        store.write_stats_and_logging(log_messages.join("\n").as_bytes())?;
    }

    commit_successors(store, &mut record, &children, &follow_ons, &detached)?;

    Ok(JobOutcome { return_value, children: child_ids, follow_ons: follow_on_ids })
}

/// True if `value` is a JSON object with exactly the shape of a serialized
/// `PromiseReference` — the worker's stand-in for "user code returned a
/// bare promise" for a single value or any component of a tuple.
fn looks_like_promise_reference(value: &serde_json::Value) -> bool {
    let Some(obj) = value.as_object() else { return false };
    obj.len() == 2 && obj.contains_key("job_store_file_id") && obj.contains_key("index")
}

pub(crate) fn returned_a_bare_promise(value: &JobReturn) -> bool {
    match value {
        JobReturn::Single(v) => looks_like_promise_reference(v),
        JobReturn::Tuple(items) => items.iter().any(looks_like_promise_reference),
    }
}

/// Steps 2 (allocation happens lazily via `JobContext::rv`), 3 (handled by
/// the caller before this is called) and 4 of the graph construction
/// protocol: the two-phase tentative-children commit.
fn commit_successors(
    store: &dyn JobStore,
    parent: &mut JobRecord,
    children: &[SuccessorDecl],
    follow_ons: &[SuccessorDecl],
    detached: &[(JobStoreId, JobSpec, u32)],
) -> Result<(), WorkerError> {
    let mut new_ids: IndexSet<JobStoreId> = IndexSet::new();
    for decl in children.iter().chain(follow_ons.iter()) {
        if let SuccessorDecl::New { job_store_id, .. } = decl {
            new_ids.insert(*job_store_id);
        }
    }
    for (id, _, _) in detached {
        new_ids.insert(*id);
    }

    if new_ids.is_empty() {
        // No new children to tear if we crash — skip the jobs_to_delete
        // round trip and just append any join-only phases.
        finish_commit(store, parent, children, follow_ons)?;
        return Ok(());
    }

    parent.jobs_to_delete = new_ids;
    store.update(parent)?;

    for decl in children.iter().chain(follow_ons.iter()) {
        if let SuccessorDecl::New { job_store_id, spec } = decl {
            create_new_record(store, *job_store_id, spec, 0)?;
        }
    }
    for (id, spec, predecessor_number) in detached {
        create_new_record(store, *id, spec, *predecessor_number)?;
    }

    parent.jobs_to_delete.clear();
    finish_commit(store, parent, children, follow_ons)
}

fn finish_commit(
    store: &dyn JobStore,
    parent: &mut JobRecord,
    children: &[SuccessorDecl],
    follow_ons: &[SuccessorDecl],
) -> Result<(), WorkerError> {
    let child_phase = descriptor_phase(children);
    let follow_on_phase = descriptor_phase(follow_ons);
    parent.command = None;
    parent.push_phases(follow_on_phase, child_phase);
    store.update(parent)?;
    Ok(())
}

fn descriptor_phase(decls: &[SuccessorDecl]) -> StackPhase {
    decls
        .iter()
        .map(|decl| match decl {
            SuccessorDecl::New { job_store_id, spec } => {
                SuccessorDescriptor::new(*job_store_id, spec.resources)
            }
            SuccessorDecl::Existing { job_store_id, predecessor_id, resources } => {
                SuccessorDescriptor::new(*job_store_id, *resources).with_predecessor(*predecessor_id)
            }
        })
        .collect()
}

fn create_new_record(
    store: &dyn JobStore,
    job_store_id: JobStoreId,
    spec: &JobSpec,
    predecessor_number: u32,
) -> Result<(), WorkerError> {
    let spec_file_id = store.write_file(job_store_id, &serde_json::to_vec(spec)?)?;
    let mut record = JobRecord::new(job_store_id, Some(worker_command(job_store_id)), spec.resources);
    record.predecessor_number = predecessor_number;
    record.job_spec_file_id = Some(spec_file_id);
    store.update(&record)?;
    Ok(())
}

#[cfg(test)]
#[path = "commit_tests.rs"]
mod tests;
