//! §4.6: background consumer draining per-job stats/log blobs from the
//! store's append-and-drain channel into a single aggregated document.

use crate::error::EngineError;
use std::time::Duration;
use tokio::sync::oneshot;
use trellis_core::Clock;
use trellis_storage::JobStore;

/// Shared-file name the aggregated document is written under.
pub const STATS_SHARED_FILE_NAME: &str = "stats.log";

const DRAIN_INTERVAL: Duration = Duration::from_secs(1);

/// The leader's half of the one-slot termination signal.
pub struct AggregatorHandle {
    stop: oneshot::Sender<()>,
}

impl AggregatorHandle {
    /// Signal the aggregator to drain whatever remains and exit. A no-op if
    /// the aggregator task has already exited on its own.
    pub fn stop(self) {
        let _ = self.stop.send(());
    }
}

/// Create a fresh termination signal: the receiver half is handed to
/// [`run`], the sender half kept by the caller (typically spawned as its
/// own task alongside [`crate::leader::run`]) as an [`AggregatorHandle`].
pub fn signal() -> (AggregatorHandle, oneshot::Receiver<()>) {
    let (tx, rx) = oneshot::channel();
    (AggregatorHandle { stop: tx }, rx)
}

/// Run until `stop` fires: write the header, poll-and-drain on
/// [`DRAIN_INTERVAL`], then drain once more and write the footer.
pub async fn run(
    store: &dyn JobStore,
    mut stop: oneshot::Receiver<()>,
    clock: impl Clock,
) -> Result<(), EngineError> {
    let started = clock.now();
    write_header(store)?;

    loop {
        tokio::select! {
            _ = &mut stop => break,
            _ = tokio::time::sleep(DRAIN_INTERVAL) => {
                drain_once(store)?;
            }
        }
    }

    drain_once(store)?;
    write_footer(store, clock.now().duration_since(started))?;
    Ok(())
}

fn write_header(store: &dyn JobStore) -> Result<(), EngineError> {
    Ok(store.write_shared_file(STATS_SHARED_FILE_NAME, b"=== trellis stats/log ===\n")?)
}

fn drain_once(store: &dyn JobStore) -> Result<usize, EngineError> {
    let mut document = store.read_shared_file(STATS_SHARED_FILE_NAME).unwrap_or_default();
    let mut drained_any = false;
    let count = store.read_stats_and_logging(&mut |blob| {
        document.extend_from_slice(blob);
        document.push(b'\n');
        drained_any = true;
    })?;
    if drained_any {
        store.write_shared_file(STATS_SHARED_FILE_NAME, &document)?;
    }
    Ok(count)
}

fn write_footer(store: &dyn JobStore, elapsed: Duration) -> Result<(), EngineError> {
    let mut document = store.read_shared_file(STATS_SHARED_FILE_NAME).unwrap_or_default();
    document.extend_from_slice(format!("=== end (elapsed {:.1}s) ===\n", elapsed.as_secs_f64()).as_bytes());
    Ok(store.write_shared_file(STATS_SHARED_FILE_NAME, &document)?)
}

#[cfg(test)]
#[path = "stats_aggregator_tests.rs"]
mod tests;
