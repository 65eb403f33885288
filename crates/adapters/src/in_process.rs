//! An in-process batch system: dispatches each issued command directly via
//! an injected handler rather than spawning a subprocess.
//!
//! Grounded on the same task-per-job shape as [`crate::local::LocalBatchSystem`],
//! but the "command" never leaves the process: the handler given at
//! construction time is the worker-side graph-expansion entry point
//! (`trellis_worker::run_job`), invoked on a blocking thread so a long user
//! job cannot stall the tokio runtime driving the leader loop.

use crate::batch_system::{BatchSystem, BatchSystemError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use trellis_core::{BatchJobId, Resources};

/// A handler invoked with the issued command string; returns the exit code
/// a real process would have produced (0 for success).
pub type DispatchHandler = Arc<dyn Fn(&str) -> i32 + Send + Sync>;

struct RunningJob {
    started_at: Instant,
    kill: Arc<tokio::sync::Notify>,
    finished: Arc<tokio::sync::Notify>,
}

pub struct InProcessBatchSystem {
    handler: DispatchHandler,
    running: Arc<Mutex<HashMap<BatchJobId, RunningJob>>>,
    completions_tx: mpsc::UnboundedSender<(BatchJobId, i32)>,
    completions_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<(BatchJobId, i32)>>,
}

impl InProcessBatchSystem {
    pub fn new(handler: DispatchHandler) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            handler,
            running: Arc::new(Mutex::new(HashMap::new())),
            completions_tx: tx,
            completions_rx: tokio::sync::Mutex::new(rx),
        }
    }
}

#[async_trait]
impl BatchSystem for InProcessBatchSystem {
    async fn issue_batch_job(
        &self,
        command: String,
        _resources: Resources,
    ) -> Result<BatchJobId, BatchSystemError> {
        let id = BatchJobId::new();
        let kill = Arc::new(tokio::sync::Notify::new());
        let finished = Arc::new(tokio::sync::Notify::new());
        self.running.lock().insert(id, RunningJob { started_at: Instant::now(), kill: kill.clone(), finished: finished.clone() });

        let running = self.running.clone();
        let tx = self.completions_tx.clone();
        let handler = self.handler.clone();
        tokio::spawn(async move {
            // No cooperative cancellation mid-handler: a running blocking
            // closure cannot be preempted, so a kill signal only changes
            // the exit code a caller sees (137 instead of the handler's own
            // result), never how long the join actually takes. Both select
            // arms wait on the same handle, so `finished` is only signalled
            // once the handler has truly returned.
            let mut handle = tokio::task::spawn_blocking(move || handler(&command));
            let result = tokio::select! {
                result = &mut handle => result.unwrap_or(1),
                _ = kill.notified() => {
                    let _ = (&mut handle).await;
                    137
                }
            };

            running.lock().remove(&id);
            let _ = tx.send((id, result));
            finished.notify_one();
        });

        Ok(id)
    }

    /// Blocks until every id named has left `running`: notifies each one's
    /// kill signal, then waits on its finished signal so a caller never
    /// observes the job as done while its task is still executing.
    async fn kill_batch_jobs(&self, ids: &[BatchJobId]) -> Result<(), BatchSystemError> {
        let mut waits = Vec::new();
        for id in ids {
            if let Some(job) = self.running.lock().get(id) {
                job.kill.notify_one();
                waits.push(job.finished.clone());
            }
        }
        for finished in waits {
            finished.notified().await;
        }
        Ok(())
    }

    async fn issued_batch_job_ids(&self) -> Vec<BatchJobId> {
        self.running.lock().keys().copied().collect()
    }

    async fn running_batch_job_ids(&self) -> HashMap<BatchJobId, Duration> {
        let now = Instant::now();
        self.running.lock().iter().map(|(id, job)| (*id, now.duration_since(job.started_at))).collect()
    }

    async fn get_updated_batch_job(&self, max_wait: Duration) -> Option<(BatchJobId, i32)> {
        let mut rx = self.completions_rx.lock().await;
        tokio::time::timeout(max_wait, rx.recv()).await.ok().flatten()
    }

    async fn shutdown(&self) {
        let ids: Vec<BatchJobId> = self.running.lock().keys().copied().collect();
        let _ = self.kill_batch_jobs(&ids).await;
    }
}

#[cfg(test)]
#[path = "in_process_tests.rs"]
mod tests;
