//! Shared harness for the end-to-end scenarios in SPEC_FULL.md §8: wires a
//! job store, an in-process batch system dispatching through the real
//! worker-side commit protocol, and the leader loop, then drives a root job
//! to completion. Used against both job-store backends.

use std::sync::Arc;
use trellis_adapters::{DispatchHandler, InProcessBatchSystem};
use trellis_core::{Config, Resources, SystemClock};
use trellis_storage::JobStore;
use trellis_worker::{worker_command, JobRegistry, JobSpec};

/// Create a record that runs `tag`'s job immediately (no predecessors).
pub fn setup_job(
    store: &dyn JobStore,
    tag: &str,
    payload: serde_json::Value,
    resources: Resources,
) -> trellis_core::JobStoreId {
    let record = store.create(None, resources, 0).expect("create");
    let id = record.job_store_id;
    let spec = JobSpec::new(tag, payload, resources);
    let spec_file_id = store.write_file(id, &serde_json::to_vec(&spec).expect("serialize")).expect("write spec");
    let mut record = record;
    record.command = Some(worker_command(id));
    record.job_spec_file_id = Some(spec_file_id);
    store.update(&record).expect("update");
    id
}

/// Run the leader loop (with a background stats aggregator) to completion
/// against `root`, using `registry` to dispatch every reachable job tag.
/// Returns the count of terminally failed jobs.
pub async fn run_to_completion(store: Arc<dyn JobStore>, registry: JobRegistry, root: trellis_core::JobStoreId) -> u32 {
    let registry = Arc::new(registry);
    let handler_store = store.clone();
    let handler_registry = registry.clone();
    let handler: DispatchHandler =
        Arc::new(move |command| trellis_worker::dispatch(handler_store.as_ref(), handler_registry.as_ref(), command));
    let batch_system = InProcessBatchSystem::new(handler);

    let mut config = Config::new("test");
    config.root_job = Some(root);

    let (aggregator_handle, aggregator_stop) = trellis_engine::aggregator_signal();
    let aggregator_store = store.clone();
    let aggregator_task =
        tokio::spawn(async move { trellis_engine::run_aggregator(aggregator_store.as_ref(), aggregator_stop, SystemClock).await });

    let failed =
        trellis_engine::run_leader(store.as_ref(), &batch_system, &config, &SystemClock).await.expect("leader run");

    aggregator_handle.stop();
    aggregator_task.await.expect("aggregator task").expect("aggregator run");

    failed
}
