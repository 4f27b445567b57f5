//! Image backend trait and shared error type.
//!
//! The [`ImageBackend`] trait covers the two operations the pipeline runs
//! per unit of work: scoring a pair and encoding one diff. The production
//! implementation is [`RustBackend`](super::rust_backend::RustBackend).
//! Pipeline tests use the recording `MockBackend` below so they can check
//! scheduling and bookkeeping without decoding a single pixel.

use super::params::{DiffParams, DiffStats};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to decode {path}: {message}")]
    Decode { path: PathBuf, message: String },
    #[error("Failed to encode {path}: {message}")]
    Encode { path: PathBuf, message: String },
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{child} is {child_dims:?} but its parent {parent} is {parent_dims:?}")]
    DimensionMismatch {
        child: PathBuf,
        parent: PathBuf,
        child_dims: (u32, u32),
        parent_dims: (u32, u32),
    },
}

impl BackendError {
    pub(crate) fn decode(path: &Path, message: impl ToString) -> Self {
        Self::Decode {
            path: path.to_path_buf(),
            message: message.to_string(),
        }
    }
}

/// Trait for image processing backends.
///
/// Both operations must be safe to call concurrently on disjoint inputs;
/// the pipeline calls them from rayon workers.
pub trait ImageBackend: Sync {
    /// Count of pixels identical between the two images.
    fn similarity(&self, first: &Path, second: &Path) -> Result<u64, BackendError>;

    /// Write the transparency-masked diff of `params.child` against `params.parent`.
    fn encode_diff(&self, params: &DiffParams) -> Result<DiffStats, BackendError>;
}
