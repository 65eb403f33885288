//! §8 scenario 6: `P` returns the tuple `(1, 2)`; `Q` is declared as a
//! follow-on with `rv(0)` and `rv(1)` as argument placeholders. Expect `Q`'s
//! worker to observe the literal values `1` and `2`, never a promise handle.

use crate::common::{run_to_completion, setup_job};
use std::sync::Arc;
use trellis_core::{JobReturn, PromiseSlot, Resources};
use trellis_storage::{FsJobStore, JobStore, MemoryJobStore};
use trellis_worker::{ContextFnJob, JobContext, JobRegistry, JobSpec, UserJob, WorkerError};

fn run_q(args: &[serde_json::Value], ctx: &mut JobContext<'_>) -> Result<JobReturn, WorkerError> {
    let first = args.first().cloned().unwrap_or(serde_json::Value::Null);
    let second = args.get(1).cloned().unwrap_or(serde_json::Value::Null);
    assert_eq!(first, serde_json::json!(1), "expected a materialized literal, not a promise handle");
    assert_eq!(second, serde_json::json!(2), "expected a materialized literal, not a promise handle");
    ctx.log("Q observed literals");
    Ok(JobReturn::single(serde_json::json!("q done")))
}

fn run_p(_args: &[serde_json::Value], ctx: &mut JobContext<'_>) -> Result<JobReturn, WorkerError> {
    let first = ctx.rv(0).expect("rv(0)");
    let second = ctx.rv(1).expect("rv(1)");
    ctx.add_follow_on(JobSpec::new(
        "q",
        serde_json::to_value(ContextFnJob {
            args: vec![PromiseSlot::reference(first), PromiseSlot::reference(second)],
            resources: Resources::default(),
            func: None,
        })
        .expect("serialize"),
        Resources::default(),
    ));
    Ok(JobReturn::tuple(vec![serde_json::json!(1), serde_json::json!(2)]))
}

fn registry() -> JobRegistry {
    let mut registry = JobRegistry::new();
    registry.register("p", |payload| {
        let mut job: ContextFnJob = serde_json::from_value(payload)?;
        job.func = Some(run_p);
        Ok(Box::new(job) as Box<dyn UserJob>)
    });
    registry.register("q", |payload| {
        let mut job: ContextFnJob = serde_json::from_value(payload)?;
        job.func = Some(run_q);
        Ok(Box::new(job) as Box<dyn UserJob>)
    });
    registry
}

async fn assert_promise_values_materialize_before_run(store: Arc<dyn JobStore>) {
    let root = setup_job(
        store.as_ref(),
        "p",
        serde_json::to_value(ContextFnJob { args: vec![], resources: Resources::default(), func: None }).expect("serialize"),
        Resources::default(),
    );

    let total_failed = run_to_completion(store.clone(), registry(), root).await;

    assert_eq!(total_failed, 0);
    assert!(store.jobs().expect("jobs").is_empty());

    let log = store.read_shared_file(trellis_engine::STATS_SHARED_FILE_NAME).expect("read stats log");
    let text = String::from_utf8(log).expect("utf8");
    assert!(text.contains("Q observed literals"), "expected Q to run and observe literals:\n{text}");
}

#[tokio::test(flavor = "multi_thread")]
async fn promise_values_materialize_before_run_against_memory_store() {
    assert_promise_values_materialize_before_run(Arc::new(MemoryJobStore::new())).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn promise_values_materialize_before_run_against_fs_store() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = FsJobStore::open(dir.path()).expect("open fs store");
    assert_promise_values_materialize_before_run(Arc::new(store)).await;
}
