//! §8 scenario 5: a worker for `A` committed step one of the two-phase
//! successor protocol (`jobs_to_delete` stamped with the ids it intends to
//! create) then "died" before finishing. Expect the next reconciliation
//! pass to delete the torn ids, clear `A`'s `jobs_to_delete`, and let `A`
//! run to completion exactly once.

use crate::common::{run_to_completion, setup_job};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use trellis_core::{JobReturn, JobStoreId, Resources};
use trellis_storage::{FsJobStore, JobStore, MemoryJobStore};
use trellis_worker::{ContextFnJob, JobContext, JobRegistry, UserJob, WorkerError};

static RUN_A_COUNT: AtomicU32 = AtomicU32::new(0);

fn run_a(_args: &[serde_json::Value], ctx: &mut JobContext<'_>) -> Result<JobReturn, WorkerError> {
    RUN_A_COUNT.fetch_add(1, Ordering::SeqCst);
    ctx.log("A ran");
    Ok(JobReturn::single(serde_json::json!("a done")))
}

fn registry() -> JobRegistry {
    let mut registry = JobRegistry::new();
    registry.register("a", |payload| {
        let mut job: ContextFnJob = serde_json::from_value(payload)?;
        job.func = Some(run_a);
        Ok(Box::new(job) as Box<dyn UserJob>)
    });
    registry
}

/// Stamp `a`'s freshly created record as torn, the way a worker that
/// crashed between the two phases of `commit_successors` would leave it:
/// `jobs_to_delete` points at ids no record was ever created for.
fn tear_record(store: &dyn JobStore, job_store_id: JobStoreId) {
    let mut record = store.load(job_store_id).expect("load");
    record.jobs_to_delete.insert(JobStoreId::new());
    record.jobs_to_delete.insert(JobStoreId::new());
    store.update(&record).expect("update");
}

async fn assert_torn_record_is_reconciled_and_rerun(store: Arc<dyn JobStore>) {
    RUN_A_COUNT.store(0, Ordering::SeqCst);
    let root = setup_job(
        store.as_ref(),
        "a",
        serde_json::to_value(ContextFnJob { args: vec![], resources: Resources::default(), func: None }).expect("serialize"),
        Resources::default(),
    );
    tear_record(store.as_ref(), root);

    let total_failed = run_to_completion(store.clone(), registry(), root).await;

    assert_eq!(total_failed, 0);
    assert_eq!(RUN_A_COUNT.load(Ordering::SeqCst), 1, "A must run exactly once despite the torn leftover state");
    assert!(store.jobs().expect("jobs").is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn torn_record_is_reconciled_and_rerun_against_memory_store() {
    assert_torn_record_is_reconciled_and_rerun(Arc::new(MemoryJobStore::new())).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn torn_record_is_reconciled_and_rerun_against_fs_store() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = FsJobStore::open(dir.path()).expect("open fs store");
    assert_torn_record_is_reconciled_and_rerun(Arc::new(store)).await;
}
