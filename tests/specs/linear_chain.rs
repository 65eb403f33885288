//! §8 scenario 1: root `A` declares child `B`; `B` declares child `C`; `C`
//! has no successors. Expect three workers issued in order A->B->C and
//! zero failures, against both job-store backends.

use crate::common::{run_to_completion, setup_job};
use std::sync::Arc;
use trellis_core::{JobReturn, Resources};
use trellis_storage::{FsJobStore, JobStore, MemoryJobStore};
use trellis_worker::{ContextFnJob, JobContext, JobRegistry, JobSpec, UserJob, WorkerError};

fn run_c(_args: &[serde_json::Value], ctx: &mut JobContext<'_>) -> Result<JobReturn, WorkerError> {
    ctx.log("C");
    Ok(JobReturn::single(serde_json::json!("c done")))
}

fn run_b(_args: &[serde_json::Value], ctx: &mut JobContext<'_>) -> Result<JobReturn, WorkerError> {
    ctx.log("B");
    ctx.add_child(JobSpec::new(
        "c",
        serde_json::to_value(ContextFnJob { args: vec![], resources: Resources::default(), func: None }).expect("serialize"),
        Resources::default(),
    ));
    Ok(JobReturn::single(serde_json::json!("b done")))
}

fn run_a(_args: &[serde_json::Value], ctx: &mut JobContext<'_>) -> Result<JobReturn, WorkerError> {
    ctx.log("A");
    ctx.add_child(JobSpec::new(
        "b",
        serde_json::to_value(ContextFnJob { args: vec![], resources: Resources::default(), func: None }).expect("serialize"),
        Resources::default(),
    ));
    Ok(JobReturn::single(serde_json::json!("a done")))
}

fn registry() -> JobRegistry {
    let mut registry = JobRegistry::new();
    registry.register("a", |payload| {
        let mut job: ContextFnJob = serde_json::from_value(payload)?;
        job.func = Some(run_a);
        Ok(Box::new(job) as Box<dyn UserJob>)
    });
    registry.register("b", |payload| {
        let mut job: ContextFnJob = serde_json::from_value(payload)?;
        job.func = Some(run_b);
        Ok(Box::new(job) as Box<dyn UserJob>)
    });
    registry.register("c", |payload| {
        let mut job: ContextFnJob = serde_json::from_value(payload)?;
        job.func = Some(run_c);
        Ok(Box::new(job) as Box<dyn UserJob>)
    });
    registry
}

async fn assert_chain_runs_in_order(store: Arc<dyn JobStore>) {
    let root = setup_job(
        store.as_ref(),
        "a",
        serde_json::to_value(ContextFnJob { args: vec![], resources: Resources::default(), func: None }).expect("serialize"),
        Resources::default(),
    );

    let total_failed = run_to_completion(store.clone(), registry(), root).await;

    assert_eq!(total_failed, 0);
    assert!(store.jobs().expect("jobs").is_empty());

    let log = store.read_shared_file(trellis_engine::STATS_SHARED_FILE_NAME).expect("read stats log");
    let text = String::from_utf8(log).expect("utf8");
    let a = text.find('A').expect("A logged");
    let b = text.find('B').expect("B logged");
    let c = text.find('C').expect("C logged");
    assert!(a < b && b < c, "expected A before B before C, got:\n{text}");
}

#[tokio::test(flavor = "multi_thread")]
async fn linear_chain_runs_in_order_against_memory_store() {
    assert_chain_runs_in_order(Arc::new(MemoryJobStore::new())).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn linear_chain_runs_in_order_against_fs_store() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = FsJobStore::open(dir.path()).expect("open fs store");
    assert_chain_runs_in_order(Arc::new(store)).await;
}
