//! Resource requests attached to a job or successor descriptor.

use serde::{Deserialize, Serialize};

/// Resource request for a single job invocation.
///
/// Units are left abstract (bytes for memory/disk, millicores for cpu) since
/// the concrete batch backend interprets them; the scheduler only ever
/// compares, sums, and forwards these values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resources {
    pub memory: u64,
    pub cpu: u64,
    pub disk: u64,
}

impl Resources {
    pub const fn new(memory: u64, cpu: u64, disk: u64) -> Self {
        Self { memory, cpu, disk }
    }
}

impl Default for Resources {
    fn default() -> Self {
        // Mirrors the defaults a Config document supplies when a job does
        // not specify its own resource request.
        Self { memory: 2 * 1024 * 1024 * 1024, cpu: 1000, disk: 2 * 1024 * 1024 * 1024 }
    }
}
