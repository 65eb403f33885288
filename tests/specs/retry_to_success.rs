//! §8 scenario 3: `B` fails with exit 1 twice, succeeds on the third
//! attempt; `try_count = 3`. Expect `B` issued three times and zero
//! terminal failures.

use crate::common::run_to_completion;
use serial_test::serial;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use trellis_core::{JobReturn, Resources};
use trellis_storage::{FsJobStore, JobStore, MemoryJobStore};
use trellis_worker::{worker_command, ContextFnJob, JobContext, JobRegistry, JobSpec, UserJob, WorkerError};

static ATTEMPTS: AtomicU32 = AtomicU32::new(0);

fn flaky_then_succeeds(_args: &[serde_json::Value], ctx: &mut JobContext<'_>) -> Result<JobReturn, WorkerError> {
    let attempt = ATTEMPTS.fetch_add(1, Ordering::SeqCst) + 1;
    ctx.log(format!("attempt {attempt}"));
    if attempt < 3 {
        return Err(WorkerError::MissingFunction);
    }
    Ok(JobReturn::single(serde_json::json!("succeeded on third try")))
}

fn registry() -> JobRegistry {
    let mut registry = JobRegistry::new();
    registry.register("flaky", |payload| {
        let mut job: ContextFnJob = serde_json::from_value(payload)?;
        job.func = Some(flaky_then_succeeds);
        Ok(Box::new(job) as Box<dyn UserJob>)
    });
    registry
}

fn setup_retriable_job(store: &dyn JobStore, try_count: u32) -> trellis_core::JobStoreId {
    let mut record = store.create(None, Resources::default(), 0).expect("create");
    record.remaining_retry_count = try_count;
    let id = record.job_store_id;
    let spec = JobSpec::new(
        "flaky",
        serde_json::to_value(ContextFnJob { args: vec![], resources: Resources::default(), func: None }).expect("serialize"),
        Resources::default(),
    );
    let spec_file_id = store.write_file(id, &serde_json::to_vec(&spec).expect("serialize")).expect("write spec");
    record.command = Some(worker_command(id));
    record.job_spec_file_id = Some(spec_file_id);
    store.update(&record).expect("update");
    id
}

async fn assert_retries_until_success(store: Arc<dyn JobStore>) {
    ATTEMPTS.store(0, Ordering::SeqCst);
    let root = setup_retriable_job(store.as_ref(), 3);

    let total_failed = run_to_completion(store.clone(), registry(), root).await;

    assert_eq!(total_failed, 0);
    assert_eq!(ATTEMPTS.load(Ordering::SeqCst), 3);
    assert!(store.jobs().expect("jobs").is_empty());
}

#[tokio::test(flavor = "multi_thread")]
#[serial(retry_attempts_counter)]
async fn retries_until_success_against_memory_store() {
    assert_retries_until_success(Arc::new(MemoryJobStore::new())).await;
}

#[tokio::test(flavor = "multi_thread")]
#[serial(retry_attempts_counter)]
async fn retries_until_success_against_fs_store() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = FsJobStore::open(dir.path()).expect("open fs store");
    assert_retries_until_success(Arc::new(store)).await;
}
