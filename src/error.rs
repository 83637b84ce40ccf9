use std::fmt;
use std::path::PathBuf;

use framescope_comparator::{DescriptorError, SimilarityError};
use framescope_decoder::ExtractError;
use framescope_store::StoreError;
use framescope_types::VectorError;
use serde::Serialize;
use thiserror::Error;

use crate::settings::ConfigError;

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Stable classification of every pipeline failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Extraction,
    EmptyResult,
    Decode,
    Store,
    NotFound,
    Query,
    DegenerateVector,
    DimensionMismatch,
    Validation,
    Timeout,
    Configuration,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Extraction => "extraction",
            ErrorKind::EmptyResult => "empty_result",
            ErrorKind::Decode => "decode",
            ErrorKind::Store => "store",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Query => "query",
            ErrorKind::DegenerateVector => "degenerate_vector",
            ErrorKind::DimensionMismatch => "dimension_mismatch",
            ErrorKind::Validation => "validation",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Configuration => "configuration",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid request: {message}")]
    Validation { message: String },

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Settings(#[from] ConfigError),

    #[error("failed to read video {}: {source}", path.display())]
    Video {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("background task failed: {message}")]
    Task { message: String },
}

impl PipelineError {
    pub fn validation(message: impl Into<String>) -> Self {
        PipelineError::Validation {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Validation { .. } => ErrorKind::Validation,
            PipelineError::Extract(err) => match err {
                ExtractError::Unsupported { .. } | ExtractError::Configuration { .. } => {
                    ErrorKind::Configuration
                }
                ExtractError::InvalidRequest { .. } => ErrorKind::Validation,
                ExtractError::EmptyResult { .. } => ErrorKind::EmptyResult,
                ExtractError::Timeout { .. } => ErrorKind::Timeout,
                ExtractError::Extraction { .. }
                | ExtractError::Probe { .. }
                | ExtractError::Io(_)
                | ExtractError::Manifest(_) => ErrorKind::Extraction,
            },
            PipelineError::Descriptor(err) => match err {
                DescriptorError::Decode { .. } => ErrorKind::Decode,
                DescriptorError::InvalidVector(err) => vector_kind(err, ErrorKind::Decode),
            },
            PipelineError::Store(err) => match err {
                StoreError::Configuration { .. } => ErrorKind::Configuration,
                StoreError::Timeout { .. } => ErrorKind::Timeout,
                StoreError::NotFound { .. } => ErrorKind::NotFound,
                StoreError::Query { .. } => ErrorKind::Query,
                StoreError::Similarity(SimilarityError::DegenerateVector) => {
                    ErrorKind::DegenerateVector
                }
                StoreError::Similarity(SimilarityError::DimensionMismatch { .. }) => {
                    ErrorKind::DimensionMismatch
                }
                StoreError::InvalidVector(err) => vector_kind(err, ErrorKind::Store),
                StoreError::Backend { .. } | StoreError::Snapshot { .. } | StoreError::Io(_) => {
                    ErrorKind::Store
                }
            },
            PipelineError::Settings(_) => ErrorKind::Configuration,
            PipelineError::Video { .. } => ErrorKind::Validation,
            PipelineError::Task { .. } => ErrorKind::Extraction,
        }
    }
}

fn vector_kind(err: &VectorError, otherwise: ErrorKind) -> ErrorKind {
    match err {
        VectorError::DimensionMismatch { .. } => ErrorKind::DimensionMismatch,
        VectorError::NonFinite { .. } => otherwise,
    }
}
