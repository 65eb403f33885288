//! Shared fixtures for tests across crates in this workspace.
//!
//! Gated behind `test-support` so downstream crates can depend on it with
//! `features = ["test-support"]` in `[dev-dependencies]`.

use crate::id::JobStoreId;
use crate::job_record::JobRecord;
use crate::resources::Resources;

/// Build a runnable job record with the given command, default resources,
/// and a single retry.
pub fn fixture_job(command: &str) -> JobRecord {
    JobRecord::new(JobStoreId::new(), Some(command.to_string()), Resources::default())
}

/// Build a terminal job record (no command, no successors).
pub fn fixture_terminal_job() -> JobRecord {
    JobRecord::new(JobStoreId::new(), None, Resources::default())
}
