use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use framescope_types::Frame;
use thiserror::Error;

use crate::catalog::FrameCatalog;

pub type ExtractResult<T> = Result<T, ExtractError>;

pub type DynFrameExtractor = Arc<dyn FrameExtractor>;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("backend {backend} is not supported in this build")]
    Unsupported { backend: &'static str },

    #[error("configuration error: {message}")]
    Configuration { message: String },

    #[error("invalid extraction request: {message}")]
    InvalidRequest { message: String },

    #[error("{backend} failed to extract frames from {}: {message}", path.display())]
    Extraction {
        backend: &'static str,
        path: PathBuf,
        message: String,
    },

    #[error("{backend} produced no frames for {}", path.display())]
    EmptyResult { backend: &'static str, path: PathBuf },

    #[error("{backend} did not finish within {timeout:?}")]
    Timeout {
        backend: &'static str,
        timeout: Duration,
    },

    #[error("failed to probe {}: {message}", path.display())]
    Probe { path: PathBuf, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("frame manifest error: {0}")]
    Manifest(#[from] serde_json::Error),
}

impl ExtractError {
    pub fn unsupported(backend: &'static str) -> Self {
        Self::Unsupported { backend }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    pub fn extraction(backend: &'static str, path: &Path, message: impl Into<String>) -> Self {
        Self::Extraction {
            backend,
            path: path.to_path_buf(),
            message: message.into(),
        }
    }
}

/// Validated input of a single extraction run.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionRequest {
    video_path: PathBuf,
    video_id: String,
    interval_seconds: f64,
}

impl ExtractionRequest {
    pub fn new(
        video_path: impl Into<PathBuf>,
        video_id: impl Into<String>,
        interval_seconds: f64,
    ) -> ExtractResult<Self> {
        let video_id = video_id.into();
        validate_video_id(&video_id)?;
        if !interval_seconds.is_finite() || interval_seconds <= 0.0 {
            return Err(ExtractError::invalid_request(format!(
                "interval must be a positive number of seconds, got {interval_seconds}"
            )));
        }
        Ok(Self {
            video_path: video_path.into(),
            video_id,
            interval_seconds,
        })
    }

    pub fn video_path(&self) -> &Path {
        &self.video_path
    }

    pub fn video_id(&self) -> &str {
        &self.video_id
    }

    pub fn interval_seconds(&self) -> f64 {
        self.interval_seconds
    }
}

/// Video ids name a directory under the frames root.
pub fn validate_video_id(video_id: &str) -> ExtractResult<()> {
    if video_id.trim().is_empty() {
        return Err(ExtractError::invalid_request("video id must not be empty"));
    }
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.');
    if !video_id.chars().all(allowed) || video_id.starts_with('.') {
        return Err(ExtractError::invalid_request(format!(
            "video id '{video_id}' may only contain ASCII letters, digits, '-', '_' and '.'"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VideoMetadata {
    pub duration_seconds: Option<f64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Turns a video into an ordered list of frame images on disk.
#[async_trait]
pub trait FrameExtractor: Send + Sync {
    /// Stable backend name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Catalog the extractor writes frames into.
    fn catalog(&self) -> &FrameCatalog;

    /// Samples the video at one frame per interval. Fails as a whole: no
    /// partial frame list is returned.
    async fn extract(&self, request: &ExtractionRequest) -> ExtractResult<Vec<Frame>>;

    async fn probe(&self, _video_path: &Path) -> ExtractResult<VideoMetadata> {
        Ok(VideoMetadata::default())
    }
}
