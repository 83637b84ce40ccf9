use std::path::{Path, PathBuf};

use framescope_types::Frame;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, warn};

use crate::core::{ExtractError, ExtractResult, ExtractionRequest, validate_video_id};
use crate::sequence::FrameSequence;

pub const MANIFEST_FILENAME: &str = "frames.json";

const KNOWN_EXTENSIONS: [&str; 2] = ["jpg", "png"];

/// Summary written next to the frames of a finished extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameManifest {
    pub video_id: String,
    pub interval_seconds: f64,
    pub frame_count: usize,
    pub extension: String,
}

/// Frames root with one subdirectory per video id.
#[derive(Debug, Clone)]
pub struct FrameCatalog {
    root: PathBuf,
}

impl FrameCatalog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn video_dir(&self, video_id: &str) -> PathBuf {
        self.root.join(video_id)
    }

    /// Creates the output directory for `video_id` and clears frames and the
    /// manifest left by a previous extraction.
    pub async fn prepare(&self, video_id: &str, extension: &str) -> ExtractResult<PathBuf> {
        let dir = self.video_dir(video_id);
        fs::create_dir_all(&dir).await?;
        let stale = FrameSequence::scan(&dir, extension).await?;
        if !stale.is_empty() {
            debug!(
                video_id,
                count = stale.len(),
                "removing frames from previous extraction"
            );
        }
        for path in stale.paths() {
            fs::remove_file(&path).await?;
        }
        match fs::remove_file(dir.join(MANIFEST_FILENAME)).await {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
        Ok(dir)
    }

    /// Enumerates the frames a backend wrote for `request` and records the
    /// manifest. Zero frames is an error.
    pub async fn collect(
        &self,
        request: &ExtractionRequest,
        backend: &'static str,
        extension: &str,
    ) -> ExtractResult<Vec<Frame>> {
        let dir = self.video_dir(request.video_id());
        let sequence = FrameSequence::scan(&dir, extension).await?;
        if sequence.is_empty() {
            return Err(ExtractError::EmptyResult {
                backend,
                path: request.video_path().to_path_buf(),
            });
        }
        let manifest = FrameManifest {
            video_id: request.video_id().to_string(),
            interval_seconds: request.interval_seconds(),
            frame_count: sequence.len(),
            extension: extension.to_string(),
        };
        let encoded = serde_json::to_vec_pretty(&manifest)?;
        fs::write(dir.join(MANIFEST_FILENAME), encoded).await?;
        Ok(sequence.frames(request.video_id(), request.interval_seconds()))
    }

    pub async fn read_manifest(&self, video_id: &str) -> ExtractResult<Option<FrameManifest>> {
        let path = self.video_dir(video_id).join(MANIFEST_FILENAME);
        let contents = match fs::read(&path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        Ok(Some(serde_json::from_slice(&contents)?))
    }

    /// Rebuilds the frame list of an earlier extraction from disk.
    ///
    /// Timestamps use the interval recorded in the manifest. Without one,
    /// `fallback_interval` is used and timestamps are only as accurate as that
    /// guess.
    pub async fn list_frames(
        &self,
        video_id: &str,
        fallback_interval: f64,
    ) -> ExtractResult<Vec<Frame>> {
        validate_video_id(video_id)?;
        let dir = self.video_dir(video_id);
        if let Some(manifest) = self.read_manifest(video_id).await? {
            let sequence = FrameSequence::scan(&dir, &manifest.extension).await?;
            if sequence.len() != manifest.frame_count {
                warn!(
                    video_id,
                    expected = manifest.frame_count,
                    found = sequence.len(),
                    "frame directory does not match its manifest"
                );
            }
            return Ok(sequence.frames(video_id, manifest.interval_seconds));
        }

        for extension in KNOWN_EXTENSIONS {
            let sequence = FrameSequence::scan(&dir, extension).await?;
            if !sequence.is_empty() {
                debug!(
                    video_id,
                    fallback_interval, "no manifest found, assuming fallback interval"
                );
                return Ok(sequence.frames(video_id, fallback_interval));
            }
        }
        Ok(Vec::new())
    }
}
