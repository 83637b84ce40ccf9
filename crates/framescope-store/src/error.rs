use std::path::PathBuf;
use std::time::Duration;

use framescope_comparator::SimilarityError;
use framescope_types::VectorError;
use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid store configuration: {message}")]
    Configuration { message: String },

    #[error("{backend} backend request failed: {message}")]
    Backend {
        backend: &'static str,
        message: String,
    },

    #[error("{backend} backend did not answer within {timeout:?}")]
    Timeout {
        backend: &'static str,
        timeout: Duration,
    },

    #[error("frame {frame_id} is not stored in any backend")]
    NotFound { frame_id: String },

    #[error("similarity query for {frame_id} failed on every backend: {message}")]
    Query { frame_id: String, message: String },

    #[error(transparent)]
    Similarity(#[from] SimilarityError),

    #[error("stored vector is invalid: {0}")]
    InvalidVector(#[from] VectorError),

    #[error("snapshot {}: {message}", path.display())]
    Snapshot { path: PathBuf, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn configuration(message: impl Into<String>) -> Self {
        StoreError::Configuration {
            message: message.into(),
        }
    }

    pub fn backend(backend: &'static str, message: impl Into<String>) -> Self {
        StoreError::Backend {
            backend,
            message: message.into(),
        }
    }
}
