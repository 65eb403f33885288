//! §8 scenario 4: `B` fails repeatedly until retries exhausted. Expect
//! `total_failed_jobs = 1`, a replayable log attached to the failure, and
//! `B`'s declared dependent never issued.

use crate::common::{run_to_completion, setup_job};
use std::sync::Arc;
use trellis_core::{JobReturn, Resources, StackPhase, SuccessorDescriptor};
use trellis_storage::{FsJobStore, JobStore, MemoryJobStore};
use trellis_worker::{ContextFnJob, JobContext, JobRegistry, UserJob, WorkerError};

fn always_fails(_args: &[serde_json::Value], ctx: &mut JobContext<'_>) -> Result<JobReturn, WorkerError> {
    ctx.log("doomed attempt");
    Err(WorkerError::MissingFunction)
}

fn never_runs(_args: &[serde_json::Value], ctx: &mut JobContext<'_>) -> Result<JobReturn, WorkerError> {
    ctx.log("dependent ran");
    Ok(JobReturn::single(serde_json::json!("should never happen")))
}

fn registry() -> JobRegistry {
    let mut registry = JobRegistry::new();
    registry.register("doomed", |payload| {
        let mut job: ContextFnJob = serde_json::from_value(payload)?;
        job.func = Some(always_fails);
        Ok(Box::new(job) as Box<dyn UserJob>)
    });
    registry.register("dependent", |payload| {
        let mut job: ContextFnJob = serde_json::from_value(payload)?;
        job.func = Some(never_runs);
        Ok(Box::new(job) as Box<dyn UserJob>)
    });
    registry
}

fn setup_doomed_job(store: &dyn JobStore, try_count: u32) -> trellis_core::JobStoreId {
    // `doomed`'s dependent is pre-created and dropped straight onto the
    // parent's stack: it is never issued because the parent never clears
    // its own command successfully.
    let dependent_id = setup_job(store, "dependent", dependent_payload(), Resources::default());

    let id = setup_job(store, "doomed", doomed_payload(), Resources::default());
    let mut record = store.load(id).expect("load");
    record.remaining_retry_count = try_count;
    let mut phase = StackPhase::new();
    phase.insert(SuccessorDescriptor::new(dependent_id, Resources::default()));
    record.stack.push(phase);
    store.update(&record).expect("update");
    id
}

fn doomed_payload() -> serde_json::Value {
    serde_json::to_value(ContextFnJob { args: vec![], resources: Resources::default(), func: None }).expect("serialize")
}

fn dependent_payload() -> serde_json::Value {
    serde_json::to_value(ContextFnJob { args: vec![], resources: Resources::default(), func: None }).expect("serialize")
}

async fn assert_terminal_failure_blocks_dependent(store: Arc<dyn JobStore>) {
    let root = setup_doomed_job(store.as_ref(), 2);

    let total_failed = run_to_completion(store.clone(), registry(), root).await;

    assert_eq!(total_failed, 1);
    assert!(!store.exists(root));

    let log = store.read_shared_file(trellis_engine::STATS_SHARED_FILE_NAME).expect("read stats log");
    let text = String::from_utf8(log).expect("utf8");
    assert!(!text.contains("dependent ran"), "dependent must never run:\n{text}");
}

#[tokio::test(flavor = "multi_thread")]
async fn terminal_failure_counts_once_and_blocks_dependent_against_memory_store() {
    assert_terminal_failure_blocks_dependent(Arc::new(MemoryJobStore::new())).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn terminal_failure_counts_once_and_blocks_dependent_against_fs_store() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = FsJobStore::open(dir.path()).expect("open fs store");
    assert_terminal_failure_blocks_dependent(Arc::new(store)).await;
}
