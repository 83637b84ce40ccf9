use std::path::PathBuf;

use framescope_types::VectorError;
use thiserror::Error;

pub type DescriptorResult<T> = Result<T, DescriptorError>;

#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("failed to decode frame image {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("descriptor produced an invalid vector: {0}")]
    InvalidVector(#[from] VectorError),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimilarityError {
    #[error("cannot compare vectors of different dimensions ({left} vs {right})")]
    DimensionMismatch { left: usize, right: usize },

    #[error("cannot compare a zero-magnitude vector")]
    DegenerateVector,
}
