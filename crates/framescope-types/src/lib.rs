//! Shared domain models for the framescope workspace.
//!
//! The decoder, comparator, store and CLI crates all exchange these types.
//! Keep this crate free of I/O and heavy dependencies so every other crate can
//! depend on it cheaply.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Bins per color channel in a frame descriptor.
pub const HISTOGRAM_BINS: usize = 64;
/// Channels in a frame descriptor, in R, G, B order.
pub const CHANNELS: usize = 3;
/// Length of every descriptor produced or stored by the workspace.
pub const FEATURE_DIMENSIONS: usize = HISTOGRAM_BINS * CHANNELS;
/// Zero-padding width of frame sequence numbers in ids and filenames.
pub const FRAME_INDEX_WIDTH: usize = 4;

pub type VectorResult<T> = Result<T, VectorError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum VectorError {
    #[error("feature vector must have {expected} dimensions, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("feature vector value at index {index} is not finite")]
    NonFinite { index: usize },
}

/// Fixed-length color histogram descriptor of a single frame.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f32>", into = "Vec<f32>")]
pub struct FeatureVector {
    values: Vec<f32>,
}

impl fmt::Debug for FeatureVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeatureVector")
            .field("dimensions", &self.values.len())
            .field("head", &&self.values[..self.values.len().min(4)])
            .finish()
    }
}

impl FeatureVector {
    pub fn new(values: Vec<f32>) -> VectorResult<Self> {
        if values.len() != FEATURE_DIMENSIONS {
            return Err(VectorError::DimensionMismatch {
                expected: FEATURE_DIMENSIONS,
                actual: values.len(),
            });
        }
        if let Some(index) = values.iter().position(|value| !value.is_finite()) {
            return Err(VectorError::NonFinite { index });
        }
        Ok(Self { values })
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Histogram of one channel (0 = red, 1 = green, 2 = blue).
    pub fn channel(&self, channel: usize) -> Option<&[f32]> {
        if channel >= CHANNELS {
            return None;
        }
        let start = channel * HISTOGRAM_BINS;
        Some(&self.values[start..start + HISTOGRAM_BINS])
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.values
    }
}

impl TryFrom<Vec<f32>> for FeatureVector {
    type Error = VectorError;

    fn try_from(values: Vec<f32>) -> Result<Self, Self::Error> {
        FeatureVector::new(values)
    }
}

impl From<FeatureVector> for Vec<f32> {
    fn from(value: FeatureVector) -> Self {
        value.values
    }
}

/// A sampled frame image of a video.
///
/// `id` and `timestamp` depend only on the frame's position in the extracted
/// sequence and the extraction interval, so two extractions of the same video
/// with the same interval agree on both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Frame {
    pub id: String,
    pub video_id: String,
    pub timestamp: f64,
    pub filename: String,
    pub storage_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_vector: Option<FeatureVector>,
}

impl Frame {
    pub fn from_sequence(
        video_id: &str,
        sequence_index: usize,
        interval_seconds: f64,
        storage_path: PathBuf,
    ) -> Self {
        let filename = storage_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            id: frame_id(video_id, sequence_index),
            video_id: video_id.to_string(),
            timestamp: sequence_index as f64 * interval_seconds,
            filename,
            storage_path,
            feature_vector: None,
        }
    }

    pub fn with_feature_vector(mut self, vector: FeatureVector) -> Self {
        self.feature_vector = Some(vector);
        self
    }

    pub fn has_feature_vector(&self) -> bool {
        self.feature_vector.is_some()
    }

    /// Copy of the frame metadata without the descriptor.
    pub fn metadata(&self) -> Frame {
        Frame {
            feature_vector: None,
            ..self.clone()
        }
    }
}

/// Frame id for the frame at `sequence_index` (0-based) of `video_id`.
pub fn frame_id(video_id: &str, sequence_index: usize) -> String {
    format!(
        "{video_id}_frame_{:0width$}",
        sequence_index + 1,
        width = FRAME_INDEX_WIDTH
    )
}

/// One entry of a similarity query result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityResult {
    pub frame: Frame,
    pub score: f32,
}

impl SimilarityResult {
    pub fn new(frame: &Frame, score: f32) -> Self {
        Self {
            frame: frame.metadata(),
            score,
        }
    }
}

/// Uploaded video as known to the routing layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoAsset {
    pub id: String,
    pub original_name: String,
    pub size_bytes: u64,
    pub duration_seconds: Option<f64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub uploaded_at: DateTime<Utc>,
}
