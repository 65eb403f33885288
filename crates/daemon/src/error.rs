//! The daemon binary's top-level error, wrapping each crate's own error
//! type with `#[from]` for `?`-propagation out of `main`.

use thiserror::Error;
use trellis_engine::EngineError;
use trellis_storage::StorageError;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("failed to acquire exclusive lock at {0}: already running?")]
    LockFailed(std::path::PathBuf),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),
}
