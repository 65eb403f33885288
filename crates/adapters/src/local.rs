//! A single-process batch system that runs each issued command as a child
//! process on the local machine. Used for local execution and tests; a
//! real cluster backend (a Mesos-like framework, a cluster queue) is an
//! external collaborator not carried by this repository.

use crate::batch_system::{BatchSystem, BatchSystemError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::sync::mpsc;
use trellis_core::{BatchJobId, Resources};

struct RunningJob {
    started_at: Instant,
    kill: Arc<tokio::sync::Notify>,
    finished: Arc<tokio::sync::Notify>,
}

/// Local, in-process batch system backed by `tokio::process::Command`.
///
/// Each `issue_batch_job` call spawns a background task that runs the
/// command via a shell, reports `(id, exit_code)` on completion, and can
/// be asked to terminate early through `kill_batch_jobs`.
pub struct LocalBatchSystem {
    running: Arc<Mutex<HashMap<BatchJobId, RunningJob>>>,
    completions_tx: mpsc::UnboundedSender<(BatchJobId, i32)>,
    completions_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<(BatchJobId, i32)>>,
}

impl Default for LocalBatchSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalBatchSystem {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            running: Arc::new(Mutex::new(HashMap::new())),
            completions_tx: tx,
            completions_rx: tokio::sync::Mutex::new(rx),
        }
    }
}

#[async_trait]
impl BatchSystem for LocalBatchSystem {
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
        tokio::spawn(async move {
            let mut child = match Command::new("sh").arg("-c").arg(&command).spawn() {
                Ok(child) => child,
                Err(_) => {
                    running.lock().remove(&id);
                    let _ = tx.send((id, 1));
                    finished.notify_one();
                    return;
                }
            };

            let exit_code = tokio::select! {
                status = child.wait() => status.map(|s| s.code().unwrap_or(1)).unwrap_or(1),
                _ = kill.notified() => {
                    let _ = child.start_kill();
                    let _ = child.wait().await;
                    137
                }
            };

            running.lock().remove(&id);
            let _ = tx.send((id, exit_code));
            finished.notify_one();
        });

        Ok(id)
    }

    /// Blocks until every id named has left `running`: notifies each one's
    /// kill signal, then waits on its finished signal so a caller never
    /// observes the job as done while its process is still exiting.
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
#[path = "local_tests.rs"]
mod tests;
