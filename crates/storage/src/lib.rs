#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! trellis-storage: the job store contract and its in-memory and
//! filesystem-backed implementations.

pub mod error;
pub mod fs;
pub mod job_store;
pub mod memory;
pub mod shared_file;

pub use error::StorageError;
pub use fs::FsJobStore;
pub use job_store::JobStore;
pub use memory::MemoryJobStore;
pub use shared_file::validate_shared_file_name;
