use framescope_decoder::{
    Backend, Configuration, ExtractionRequest, FrameCatalog, MANIFEST_FILENAME, MockSettings,
};

fn mock_config(frames_root: &std::path::Path, duration_seconds: f64) -> Configuration {
    Configuration {
        backend: Backend::Mock,
        frames_root: frames_root.to_path_buf(),
        mock: MockSettings {
            duration_seconds,
            width: 32,
            height: 24,
        },
        ..Configuration::default()
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn ten_second_video_at_two_second_interval_yields_five_frames() {
    let root = tempfile::tempdir().unwrap();
    let extractor = mock_config(root.path(), 10.0).create_extractor().unwrap();
    let request = ExtractionRequest::new(root.path().join("clip.mp4"), "clip", 2.0).unwrap();

    let frames = extractor.extract(&request).await.unwrap();

    let timestamps: Vec<f64> = frames.iter().map(|frame| frame.timestamp).collect();
    assert_eq!(timestamps, vec![0.0, 2.0, 4.0, 6.0, 8.0]);
    let ids: Vec<&str> = frames.iter().map(|frame| frame.id.as_str()).collect();
    assert_eq!(
        ids,
        [
            "clip_frame_0001",
            "clip_frame_0002",
            "clip_frame_0003",
            "clip_frame_0004",
            "clip_frame_0005"
        ]
    );
    assert!(frames.iter().all(|frame| frame.storage_path.exists()));
    assert!(root.path().join("clip").join(MANIFEST_FILENAME).exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn re_extraction_is_idempotent() {
    let root = tempfile::tempdir().unwrap();
    let extractor = mock_config(root.path(), 6.0).create_extractor().unwrap();
    let request = ExtractionRequest::new(root.path().join("clip.mp4"), "clip", 1.5).unwrap();

    let first = extractor.extract(&request).await.unwrap();
    let second = extractor.extract(&request).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.len(), 4);
}

#[tokio::test(flavor = "multi_thread")]
async fn shorter_re_extraction_drops_stale_frames() {
    let root = tempfile::tempdir().unwrap();
    let long = mock_config(root.path(), 10.0).create_extractor().unwrap();
    let short = mock_config(root.path(), 4.0).create_extractor().unwrap();
    let request = ExtractionRequest::new(root.path().join("clip.mp4"), "clip", 1.0).unwrap();

    assert_eq!(long.extract(&request).await.unwrap().len(), 10);
    assert_eq!(short.extract(&request).await.unwrap().len(), 4);

    let listed = FrameCatalog::new(root.path())
        .list_frames("clip", 99.0)
        .await
        .unwrap();
    assert_eq!(listed.len(), 4);
    assert_eq!(listed[3].timestamp, 3.0);
}
