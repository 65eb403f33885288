#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! trellis-core: shared IDs, clock abstraction, job-graph data model, and
//! promise dataflow for the job-graph scheduler.

pub mod macros;

pub mod clock;
pub mod config;
pub mod id;
pub mod job_record;
pub mod promise;
pub mod resources;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use clock::{Clock, FakeClock, SystemClock};
pub use config::{Config, CONFIG_SHARED_FILE_NAME};
pub use id::{BatchJobId, FileId, JobStoreId, PredecessorId};
pub use job_record::{JobRecord, StackPhase, SuccessorDescriptor};
pub use promise::{JobReturn, PromiseError, PromiseReference, PromiseSlot, ResolvePromises};
pub use resources::Resources;
