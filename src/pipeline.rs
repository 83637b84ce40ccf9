use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use framescope_comparator::{ColorHistogramDescriptor, FrameDescriptor, compute_batch};
use framescope_decoder::{
    DynFrameExtractor, ExtractError, ExtractionRequest, FrameCatalog, VideoMetadata,
};
use framescope_store::{Placement, VectorStore};
use framescope_types::{Frame, SimilarityResult, VideoAsset};
use hex::encode as hex_encode;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::task;
use tracing::{debug, info, warn};

use crate::error::{PipelineError, PipelineResult};

/// Largest `k` a similarity query accepts.
pub const MAX_SIMILAR_RESULTS: usize = 100;

const VIDEO_ID_HEX_LEN: usize = 16;
const HASH_BUFFER_BYTES: usize = 64 * 1024;

/// Validated "find frames similar to X" request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimilarityQuery {
    frame_id: String,
    k: usize,
}

impl SimilarityQuery {
    pub fn new(frame_id: impl Into<String>, k: i64) -> PipelineResult<Self> {
        let frame_id = frame_id.into();
        if frame_id.trim().is_empty() {
            return Err(PipelineError::validation("frame id must not be empty"));
        }
        let k = usize::try_from(k)
            .map_err(|_| PipelineError::validation(format!("k must not be negative, got {k}")))?;
        if k > MAX_SIMILAR_RESULTS {
            return Err(PipelineError::validation(format!(
                "k must be at most {MAX_SIMILAR_RESULTS}, got {k}"
            )));
        }
        Ok(Self { frame_id, k })
    }

    pub fn frame_id(&self) -> &str {
        &self.frame_id
    }

    pub fn k(&self) -> usize {
        self.k
    }
}

/// Outcome of one ingestion.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    pub video_id: String,
    pub interval_seconds: f64,
    pub frames: Vec<Frame>,
    pub stored_remote: usize,
    pub stored_local: usize,
    /// Frames whose image could not be described.
    pub without_vector: usize,
    /// Frames with a vector that no backend accepted.
    pub unstored: usize,
    /// Why the local snapshot could not be written. The vectors are still
    /// held by the store of this process.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_error: Option<String>,
}

impl IngestReport {
    fn new(request: &ExtractionRequest) -> Self {
        Self {
            video_id: request.video_id().to_string(),
            interval_seconds: request.interval_seconds(),
            frames: Vec::new(),
            stored_remote: 0,
            stored_local: 0,
            without_vector: 0,
            unstored: 0,
            snapshot_error: None,
        }
    }

    pub fn stored(&self) -> usize {
        self.stored_remote + self.stored_local
    }

    pub fn persisted(&self) -> bool {
        self.snapshot_error.is_none()
    }

    /// Drops the descriptors from the frame list, keeping the counts.
    pub fn strip_vectors(&mut self) {
        for frame in &mut self.frames {
            frame.feature_vector = None;
        }
    }
}

/// Coordinates extraction, description and storage of video frames.
///
/// A pipeline built with [`Pipeline::query_only`] has no extractor; it lists
/// and queries frames of earlier extractions and refuses to ingest.
pub struct Pipeline {
    extractor: Option<DynFrameExtractor>,
    catalog: FrameCatalog,
    descriptor: Arc<dyn FrameDescriptor>,
    store: Arc<VectorStore>,
}

impl Pipeline {
    pub fn new(extractor: DynFrameExtractor, store: Arc<VectorStore>) -> Self {
        Self {
            catalog: extractor.catalog().clone(),
            extractor: Some(extractor),
            descriptor: Arc::new(ColorHistogramDescriptor::new()),
            store,
        }
    }

    pub fn query_only(catalog: FrameCatalog, store: Arc<VectorStore>) -> Self {
        Self {
            extractor: None,
            catalog,
            descriptor: Arc::new(ColorHistogramDescriptor::new()),
            store,
        }
    }

    pub fn extractor(&self) -> PipelineResult<&DynFrameExtractor> {
        self.extractor.as_ref().ok_or_else(|| {
            ExtractError::configuration("pipeline was built without a decoder backend").into()
        })
    }

    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    /// Samples `video_path` every `interval_seconds`, describes every frame
    /// and stores the descriptors.
    ///
    /// Extraction failures abort the ingestion. A frame whose image cannot be
    /// described is kept without a vector; a vector no backend accepts is
    /// counted in [`IngestReport::unstored`]. A snapshot that cannot be
    /// written is recorded in [`IngestReport::snapshot_error`].
    pub async fn ingest(
        &self,
        video_path: &Path,
        video_id: &str,
        interval_seconds: f64,
    ) -> PipelineResult<IngestReport> {
        let extractor = self.extractor()?;
        let request = ExtractionRequest::new(video_path, video_id, interval_seconds)?;
        let started = Instant::now();
        info!(
            video_id,
            backend = extractor.name(),
            interval_seconds,
            "extracting frames"
        );
        let frames = extractor.extract(&request).await?;

        let paths: Vec<PathBuf> = frames
            .iter()
            .map(|frame| frame.storage_path.clone())
            .collect();
        let descriptor = Arc::clone(&self.descriptor);
        let vectors = task::spawn_blocking(move || compute_batch(descriptor.as_ref(), &paths))
            .await
            .map_err(|err| PipelineError::Task {
                message: format!("descriptor batch failed: {err}"),
            })?;
        debug!(
            video_id,
            frames = frames.len(),
            elapsed = ?started.elapsed(),
            "computed descriptors"
        );

        let mut report = IngestReport::new(&request);
        for (frame, vector) in frames.into_iter().zip(vectors) {
            let vector = match vector {
                Ok(vector) => vector,
                Err(err) => {
                    warn!(
                        frame_id = %frame.id,
                        error = %err,
                        "keeping frame without descriptor"
                    );
                    report.without_vector += 1;
                    report.frames.push(frame);
                    continue;
                }
            };
            match self.store.upsert(&frame, &vector).await {
                Ok(Placement::Remote) => report.stored_remote += 1,
                Ok(Placement::Local) => report.stored_local += 1,
                Err(err) => {
                    warn!(frame_id = %frame.id, error = %err, "failed to store descriptor");
                    report.unstored += 1;
                }
            }
            report.frames.push(frame.with_feature_vector(vector));
        }
        if let Err(err) = self.store.persist().await {
            warn!(video_id, error = %err, "failed to write vector snapshot");
            report.snapshot_error = Some(err.to_string());
        }

        info!(
            video_id,
            frames = report.frames.len(),
            stored_remote = report.stored_remote,
            stored_local = report.stored_local,
            without_vector = report.without_vector,
            unstored = report.unstored,
            elapsed = ?started.elapsed(),
            "ingestion finished"
        );
        Ok(report)
    }

    pub async fn find_similar(
        &self,
        query: &SimilarityQuery,
    ) -> PipelineResult<Vec<SimilarityResult>> {
        let results = self.store.query(query.frame_id(), query.k()).await?;
        debug!(
            frame_id = query.frame_id(),
            k = query.k(),
            results = results.len(),
            "similarity query answered"
        );
        Ok(results)
    }

    /// Describes an uploaded video. The id is derived from the file contents,
    /// so registering the same bytes twice yields the same id.
    pub async fn register_video(&self, video_path: &Path) -> PipelineResult<VideoAsset> {
        let metadata = tokio::fs::metadata(video_path)
            .await
            .map_err(|source| PipelineError::Video {
                path: video_path.to_path_buf(),
                source,
            })?;
        if !metadata.is_file() {
            return Err(PipelineError::validation(format!(
                "{} is not a file",
                video_path.display()
            )));
        }

        let owned = video_path.to_path_buf();
        let digest = task::spawn_blocking(move || hash_file(&owned))
            .await
            .map_err(|err| PipelineError::Task {
                message: format!("hashing task failed: {err}"),
            })?
            .map_err(|source| PipelineError::Video {
                path: video_path.to_path_buf(),
                source,
            })?;

        let probe = match self.extractor()?.probe(video_path).await {
            Ok(probe) => probe,
            Err(err) => {
                warn!(path = %video_path.display(), error = %err, "video probe failed");
                VideoMetadata::default()
            }
        };

        Ok(VideoAsset {
            id: digest[..VIDEO_ID_HEX_LEN].to_string(),
            original_name: video_path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            size_bytes: metadata.len(),
            duration_seconds: probe.duration_seconds,
            width: probe.width,
            height: probe.height,
            uploaded_at: Utc::now(),
        })
    }

    /// Frames of an earlier extraction, with descriptors attached when the
    /// store holds them.
    pub async fn frames_for_video(
        &self,
        video_id: &str,
        fallback_interval: f64,
    ) -> PipelineResult<Vec<Frame>> {
        let frames = self
            .catalog
            .list_frames(video_id, fallback_interval)
            .await?;
        let mut listed = Vec::with_capacity(frames.len());
        for frame in frames {
            match self.store.lookup(&frame.id).await {
                Ok(Some(vector)) => listed.push(frame.with_feature_vector(vector)),
                Ok(None) => listed.push(frame),
                Err(err) => {
                    warn!(frame_id = %frame.id, error = %err, "descriptor lookup failed");
                    listed.push(frame);
                }
            }
        }
        Ok(listed)
    }
}

fn hash_file(path: &Path) -> std::io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; HASH_BUFFER_BYTES];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hex_encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_validates_id_and_k() {
        assert!(SimilarityQuery::new("vid_frame_0001", 0).is_ok());
        assert_eq!(SimilarityQuery::new("vid_frame_0001", 100).unwrap().k(), 100);
        for (id, k) in [("", 3), ("  ", 3), ("vid_frame_0001", -1), ("vid_frame_0001", 101)] {
            let err = SimilarityQuery::new(id, k).unwrap_err();
            assert_eq!(err.kind(), crate::error::ErrorKind::Validation, "{id} {k}");
        }
    }

    #[test]
    fn file_hash_depends_on_contents_only() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.mp4");
        let b = dir.path().join("b.mp4");
        std::fs::write(&a, b"same bytes").unwrap();
        std::fs::write(&b, b"same bytes").unwrap();
        assert_eq!(hash_file(&a).unwrap(), hash_file(&b).unwrap());
        assert_eq!(hash_file(&a).unwrap().len(), 64);

        std::fs::write(&b, b"other bytes").unwrap();
        assert_ne!(hash_file(&a).unwrap(), hash_file(&b).unwrap());
    }
}
