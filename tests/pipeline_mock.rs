use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use framescope::{
    EffectiveSettings, ErrorKind, Pipeline, SimilarityQuery, build_pipeline, build_query_pipeline,
};
use framescope_decoder::{
    Backend, Configuration, DynFrameExtractor, ExtractResult, ExtractionRequest, FrameCatalog,
    FrameExtractor, MockSettings, VideoMetadata,
};
use framescope_store::{
    DynVectorBackend, LocalBackend, StoreConfig, StoreError, StoreResult, VectorBackend,
    VectorStore,
};
use framescope_types::{FEATURE_DIMENSIONS, FeatureVector, Frame, SimilarityResult};
use image::{Rgb, RgbImage};

fn mock_extractor(root: &Path, duration_seconds: f64) -> DynFrameExtractor {
    Configuration {
        backend: Backend::Mock,
        frames_root: root.join("frames"),
        mock: MockSettings {
            duration_seconds,
            width: 32,
            height: 24,
        },
        ..Configuration::default()
    }
    .create_extractor()
    .unwrap()
}

async fn local_store() -> Arc<VectorStore> {
    let store = VectorStore::local_only(LocalBackend::new());
    store.initialize().await.unwrap();
    Arc::new(store)
}

/// Delegates to another extractor, then overwrites one frame with garbage.
struct CorruptingExtractor {
    inner: DynFrameExtractor,
    corrupt_index: usize,
}

#[async_trait]
impl FrameExtractor for CorruptingExtractor {
    fn name(&self) -> &'static str {
        "corrupting"
    }

    fn catalog(&self) -> &FrameCatalog {
        self.inner.catalog()
    }

    async fn extract(&self, request: &ExtractionRequest) -> ExtractResult<Vec<Frame>> {
        let frames = self.inner.extract(request).await?;
        tokio::fs::write(&frames[self.corrupt_index].storage_path, b"not a png").await?;
        Ok(frames)
    }

    async fn probe(&self, video_path: &Path) -> ExtractResult<VideoMetadata> {
        self.inner.probe(video_path).await
    }
}

/// Writes one solid-color frame per entry of `colors`.
struct SolidColorExtractor {
    catalog: FrameCatalog,
    colors: Vec<[u8; 3]>,
}

#[async_trait]
impl FrameExtractor for SolidColorExtractor {
    fn name(&self) -> &'static str {
        "solid-color"
    }

    fn catalog(&self) -> &FrameCatalog {
        &self.catalog
    }

    async fn extract(&self, request: &ExtractionRequest) -> ExtractResult<Vec<Frame>> {
        let dir = self.catalog.prepare(request.video_id(), "png").await?;
        for (index, color) in self.colors.iter().enumerate() {
            RgbImage::from_pixel(40, 30, Rgb(*color))
                .save(dir.join(format!("frame_{:04}.png", index + 1)))
                .unwrap();
        }
        self.catalog.collect(request, self.name(), "png").await
    }

    async fn probe(&self, _video_path: &Path) -> ExtractResult<VideoMetadata> {
        Ok(VideoMetadata::default())
    }
}

struct UnreachableRemote;

#[async_trait]
impl VectorBackend for UnreachableRemote {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn ensure_collection(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn upsert(&self, _frame: &Frame, _vector: &FeatureVector) -> StoreResult<()> {
        Err(StoreError::backend("remote", "connection refused"))
    }

    async fn fetch_vector(&self, _frame_id: &str) -> StoreResult<Option<FeatureVector>> {
        Err(StoreError::backend("remote", "connection refused"))
    }

    async fn query(
        &self,
        _reference_id: &str,
        _vector: &FeatureVector,
        _k: usize,
    ) -> StoreResult<Vec<SimilarityResult>> {
        Err(StoreError::backend("remote", "connection refused"))
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn ingest_samples_describes_and_stores_every_frame() {
    let root = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::new(mock_extractor(root.path(), 10.0), local_store().await);

    let report = pipeline
        .ingest(&root.path().join("clip.mp4"), "clip", 2.0)
        .await
        .unwrap();

    let timestamps: Vec<f64> = report.frames.iter().map(|f| f.timestamp).collect();
    assert_eq!(timestamps, vec![0.0, 2.0, 4.0, 6.0, 8.0]);
    assert_eq!(report.frames[4].id, "clip_frame_0005");
    assert_eq!(report.stored_local, 5);
    assert_eq!(report.stored_remote, 0);
    assert_eq!(report.without_vector, 0);
    assert_eq!(report.unstored, 0);

    for frame in &report.frames {
        let vector = frame.feature_vector.as_ref().unwrap();
        assert_eq!(vector.len(), FEATURE_DIMENSIONS);
        for channel in 0..3 {
            let sum: f32 = vector.channel(channel).unwrap().iter().sum();
            assert!((sum - 1.0).abs() < 1e-5);
        }
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn corrupt_frame_is_kept_without_vector() {
    let root = tempfile::tempdir().unwrap();
    let extractor: DynFrameExtractor = Arc::new(CorruptingExtractor {
        inner: mock_extractor(root.path(), 5.0),
        corrupt_index: 2,
    });
    let pipeline = Pipeline::new(extractor, local_store().await);

    let report = pipeline
        .ingest(&root.path().join("clip.mp4"), "clip", 1.0)
        .await
        .unwrap();

    assert_eq!(report.frames.len(), 5);
    assert_eq!(report.without_vector, 1);
    assert_eq!(report.stored(), 4);
    assert!(!report.frames[2].has_feature_vector());
    assert_eq!(report.frames[2].id, "clip_frame_0003");
    assert!(report.frames[3].has_feature_vector());
}

#[tokio::test(flavor = "multi_thread")]
async fn similar_frames_are_ranked_and_exclude_the_reference() {
    let root = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::new(mock_extractor(root.path(), 10.0), local_store().await);
    pipeline
        .ingest(&root.path().join("clip.mp4"), "clip", 1.0)
        .await
        .unwrap();

    let query = SimilarityQuery::new("clip_frame_0001", 3).unwrap();
    let results = pipeline.find_similar(&query).await.unwrap();
    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| r.frame.id != "clip_frame_0001"));
    assert!(results.windows(2).all(|pair| pair[0].score >= pair[1].score));
    assert!(results.iter().all(|r| r.frame.feature_vector.is_none()));

    let none = SimilarityQuery::new("clip_frame_0001", 0).unwrap();
    assert!(pipeline.find_similar(&none).await.unwrap().is_empty());

    let missing = SimilarityQuery::new("clip_frame_0999", 3).unwrap();
    let err = pipeline.find_similar(&missing).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test(flavor = "multi_thread")]
async fn unreachable_remote_falls_back_to_local() {
    let root = tempfile::tempdir().unwrap();
    let remote: DynVectorBackend = Arc::new(UnreachableRemote);
    let store = VectorStore::with_backends(Some(remote), LocalBackend::new());
    store.initialize().await.unwrap();
    assert!(store.remote_active());
    let pipeline = Pipeline::new(mock_extractor(root.path(), 4.0), Arc::new(store));

    let report = pipeline
        .ingest(&root.path().join("clip.mp4"), "clip", 1.0)
        .await
        .unwrap();
    assert_eq!(report.stored_local, 4);
    assert_eq!(report.stored_remote, 0);

    let query = SimilarityQuery::new("clip_frame_0002", 10).unwrap();
    let results = pipeline.find_similar(&query).await.unwrap();
    assert_eq!(results.len(), 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn short_video_fails_the_whole_ingestion() {
    let root = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::new(mock_extractor(root.path(), 1.0), local_store().await);
    let err = pipeline
        .ingest(&root.path().join("clip.mp4"), "clip", 2.0)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EmptyResult);

    let err = pipeline
        .ingest(&root.path().join("clip.mp4"), "clip", 0.0)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test(flavor = "multi_thread")]
async fn registering_identical_bytes_yields_the_same_id() {
    let root = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::new(mock_extractor(root.path(), 10.0), local_store().await);
    let first = root.path().join("first.mp4");
    let second = root.path().join("second.mp4");
    std::fs::write(&first, b"fake video bytes").unwrap();
    std::fs::write(&second, b"fake video bytes").unwrap();

    let a = pipeline.register_video(&first).await.unwrap();
    let b = pipeline.register_video(&second).await.unwrap();
    assert_eq!(a.id, b.id);
    assert_eq!(a.id.len(), 16);
    assert_eq!(a.original_name, "first.mp4");
    assert_eq!(a.size_bytes, 16);
    assert_eq!(a.duration_seconds, Some(10.0));
    assert_eq!(a.width, Some(32));

    let err = pipeline
        .register_video(&root.path().join("absent.mp4"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test(flavor = "multi_thread")]
async fn listed_frames_carry_stored_vectors() {
    let root = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::new(mock_extractor(root.path(), 3.0), local_store().await);
    let report = pipeline
        .ingest(&root.path().join("clip.mp4"), "clip", 1.5)
        .await
        .unwrap();

    let listed = pipeline.frames_for_video("clip", 99.0).await.unwrap();
    assert_eq!(listed, report.frames);
    assert!(pipeline.frames_for_video("other", 1.0).await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn snapshot_lets_a_later_process_query() {
    let root = tempfile::tempdir().unwrap();
    let snapshot = root.path().join("state").join("vectors.json");

    let store = VectorStore::local_only(LocalBackend::with_snapshot(&snapshot).await.unwrap());
    let ingesting = Pipeline::new(mock_extractor(root.path(), 6.0), Arc::new(store));
    ingesting
        .ingest(&root.path().join("clip.mp4"), "clip", 2.0)
        .await
        .unwrap();
    drop(ingesting);

    let store = VectorStore::local_only(LocalBackend::with_snapshot(&snapshot).await.unwrap());
    let querying = Pipeline::new(mock_extractor(root.path(), 6.0), Arc::new(store));
    let query = SimilarityQuery::new("clip_frame_0003", 5).unwrap();
    let results = querying.find_similar(&query).await.unwrap();
    let mut ids: Vec<&str> = results.iter().map(|r| r.frame.id.as_str()).collect();
    ids.sort();
    assert_eq!(ids, ["clip_frame_0001", "clip_frame_0002"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn closest_color_ranks_first() {
    let root = tempfile::tempdir().unwrap();
    let extractor: DynFrameExtractor = Arc::new(SolidColorExtractor {
        catalog: FrameCatalog::new(root.path().join("frames")),
        colors: vec![[250, 0, 0], [0, 0, 250], [250, 0, 10]],
    });
    let pipeline = Pipeline::new(extractor, local_store().await);
    pipeline
        .ingest(&root.path().join("clip.mp4"), "clip", 1.0)
        .await
        .unwrap();

    let query = SimilarityQuery::new("clip_frame_0001", 2).unwrap();
    let results = pipeline.find_similar(&query).await.unwrap();
    let ids: Vec<&str> = results.iter().map(|r| r.frame.id.as_str()).collect();
    assert_eq!(ids, ["clip_frame_0003", "clip_frame_0002"]);
    assert!((f64::from(results[0].score) - 2.0 / 3.0).abs() < 1e-6);
    assert!((f64::from(results[1].score) - 1.0 / 3.0).abs() < 1e-6);
}

#[tokio::test(flavor = "multi_thread")]
async fn unwritable_snapshot_keeps_the_ingest_report() {
    let root = tempfile::tempdir().unwrap();
    let snapshot = root.path().join("vectors.json");
    std::fs::create_dir_all(root.path().join("vectors.json.tmp")).unwrap();

    let store = VectorStore::local_only(LocalBackend::with_snapshot(&snapshot).await.unwrap());
    store.initialize().await.unwrap();
    let pipeline = Pipeline::new(mock_extractor(root.path(), 4.0), Arc::new(store));

    let report = pipeline
        .ingest(&root.path().join("clip.mp4"), "clip", 1.0)
        .await
        .unwrap();
    assert_eq!(report.frames.len(), 4);
    assert_eq!(report.stored_local, 4);
    assert!(!report.persisted());
    assert!(report.snapshot_error.is_some());

    let query = SimilarityQuery::new("clip_frame_0001", 3).unwrap();
    assert_eq!(pipeline.find_similar(&query).await.unwrap().len(), 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn queries_work_without_the_decoder_tools() {
    let root = tempfile::tempdir().unwrap();
    let snapshot = root.path().join("state").join("vectors.json");
    let store = VectorStore::local_only(LocalBackend::with_snapshot(&snapshot).await.unwrap());
    let ingesting = Pipeline::new(mock_extractor(root.path(), 6.0), Arc::new(store));
    let report = ingesting
        .ingest(&root.path().join("clip.mp4"), "clip", 2.0)
        .await
        .unwrap();
    assert!(report.persisted());
    drop(ingesting);

    let settings = EffectiveSettings {
        decoder: Configuration {
            backend: Backend::Ffmpeg,
            frames_root: root.path().join("frames"),
            ffmpeg: root.path().join("missing-ffmpeg"),
            ..Configuration::default()
        },
        store: StoreConfig {
            remote: None,
            snapshot_path: Some(snapshot),
        },
        interval_seconds: 1.0,
        config_path: None,
    };
    let refused = build_pipeline(&settings).await.err().map(|err| err.kind());
    assert_eq!(refused, Some(ErrorKind::Configuration));

    let pipeline = build_query_pipeline(&settings).await.unwrap();
    let query = SimilarityQuery::new("clip_frame_0001", 5).unwrap();
    assert_eq!(pipeline.find_similar(&query).await.unwrap().len(), 2);

    let listed = pipeline.frames_for_video("clip", 1.0).await.unwrap();
    let timestamps: Vec<f64> = listed.iter().map(|f| f.timestamp).collect();
    assert_eq!(timestamps, vec![0.0, 2.0, 4.0]);
    assert!(listed.iter().all(Frame::has_feature_vector));

    let err = pipeline
        .ingest(&root.path().join("clip.mp4"), "clip", 2.0)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
}
