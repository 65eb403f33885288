//! §8 scenario 7: `A` has child `C`, which itself has child `F`. When `F`
//! runs and declares `A` as a new child of its own, the closing edge makes
//! the graph cyclic (`A -> C -> F -> A`). Expect the worker to reject it
//! with [`WorkerError::CycleDetected`] rather than commit a graph with no
//! possible topological order.

use std::sync::Arc;
use trellis_core::{JobReturn, JobStoreId, PredecessorId, PromiseSlot, Resources, StackPhase, SuccessorDescriptor};
use trellis_storage::{FsJobStore, JobStore, MemoryJobStore};
use trellis_worker::{run_job, ContextFnJob, JobContext, JobRegistry, JobSpec, UserJob, WorkerError};

fn run_f(args: &[serde_json::Value], ctx: &mut JobContext<'_>) -> Result<JobReturn, WorkerError> {
    let a_id: JobStoreId = serde_json::from_value(args[0].clone())?;
    ctx.add_child_join(a_id, PredecessorId::new(), Resources::default());
    Ok(JobReturn::single(serde_json::json!("f ran, declaring a cycle")))
}

fn registry() -> JobRegistry {
    let mut registry = JobRegistry::new();
    registry.register("f_tries_cycle", |payload| {
        let mut job: ContextFnJob = serde_json::from_value(payload)?;
        job.func = Some(run_f);
        Ok(Box::new(job) as Box<dyn UserJob>)
    });
    registry
}

/// Wire up `a -> c -> f` as pre-existing literal edges, with `f` carrying
/// `a`'s own id as an argument so its run function can try to close the
/// loop.
fn setup_pending_cycle(store: &dyn JobStore) -> (trellis_core::JobStoreId, trellis_core::JobStoreId) {
    let a = store.create(None, Resources::default(), 0).expect("create a");
    let c = store.create(None, Resources::default(), 0).expect("create c");

    let f_payload = serde_json::to_value(ContextFnJob {
        args: vec![PromiseSlot::value(a.job_store_id)],
        resources: Resources::default(),
        func: None,
    })
    .expect("serialize");
    let f = store.create(None, Resources::default(), 0).expect("create f");
    let f_spec = JobSpec::new("f_tries_cycle", f_payload, Resources::default());
    let f_spec_file = store.write_file(f.job_store_id, &serde_json::to_vec(&f_spec).expect("serialize")).expect("write spec");
    let mut f_record = f;
    f_record.job_spec_file_id = Some(f_spec_file);
    store.update(&f_record).expect("update f");

    let mut c_record = c;
    let mut c_phase = StackPhase::new();
    c_phase.insert(SuccessorDescriptor::new(f_record.job_store_id, Resources::default()));
    c_record.stack.push(c_phase);
    store.update(&c_record).expect("update c");

    let mut a_record = a;
    let mut a_phase = StackPhase::new();
    a_phase.insert(SuccessorDescriptor::new(c_record.job_store_id, Resources::default()));
    a_record.stack.push(a_phase);
    store.update(&a_record).expect("update a");

    (a_record.job_store_id, f_record.job_store_id)
}

fn assert_closing_the_loop_is_rejected(store: Arc<dyn JobStore>) {
    let (_a_id, f_id) = setup_pending_cycle(store.as_ref());

    let result = run_job(store.as_ref(), &registry(), f_id);

    match result {
        Err(WorkerError::CycleDetected) => {}
        other => panic!("expected CycleDetected, got {other:?}"),
    }

    // The rejected run must not have committed anything: F still has its
    // original command-less, cycle-pending shape.
    let f_record = store.load(f_id).expect("load f");
    assert!(f_record.jobs_to_delete.is_empty());
}

#[test]
fn closing_the_loop_is_rejected_against_memory_store() {
    assert_closing_the_loop_is_rejected(Arc::new(MemoryJobStore::new()));
}

#[test]
fn closing_the_loop_is_rejected_against_fs_store() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = FsJobStore::open(dir.path()).expect("open fs store");
    assert_closing_the_loop_is_rejected(Arc::new(store));
}
