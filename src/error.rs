use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RouterError>;

#[derive(Error, Debug)]
pub enum RouterError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to read {what} from {path}: {source}")]
    Read {
        what: &'static str,
        path: PathBuf,
        source: io::Error,
    },

    #[error("Invalid intention catalog: {0}")]
    Catalog(String),

    #[error("Embedding snapshot at {location} is unusable: {reason}")]
    SnapshotMismatch { location: String, reason: String },

    #[error("Failed to write embedding snapshot to {path}: {source}")]
    SnapshotWrite { path: PathBuf, source: io::Error },

    #[error("Embedding provider '{provider}' failed: {reason}")]
    Provider { provider: String, reason: String },

    #[error("Expected {expected}-dimensional embedding, got {actual}")]
    Dimensions { expected: usize, actual: usize },

    #[error("Failed to build worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Worker dropped the result channel before completing")]
    WorkerGone,
}
