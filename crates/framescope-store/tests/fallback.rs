use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use framescope_store::{
    DynVectorBackend, LocalBackend, Placement, StoreError, StoreResult, VectorBackend,
    VectorStore,
};
use framescope_types::{FEATURE_DIMENSIONS, FeatureVector, Frame, SimilarityResult};

/// Remote stand-in whose calls all fail.
#[derive(Default)]
struct UnreachableBackend {
    calls: AtomicUsize,
    fail_init: bool,
}

impl UnreachableBackend {
    fn fail(&self) -> StoreError {
        self.calls.fetch_add(1, Ordering::SeqCst);
        StoreError::backend("remote", "connection refused")
    }
}

#[async_trait]
impl VectorBackend for UnreachableBackend {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn ensure_collection(&self) -> StoreResult<()> {
        if self.fail_init {
            return Err(self.fail());
        }
        Ok(())
    }

    async fn upsert(&self, _frame: &Frame, _vector: &FeatureVector) -> StoreResult<()> {
        Err(self.fail())
    }

    async fn fetch_vector(&self, _frame_id: &str) -> StoreResult<Option<FeatureVector>> {
        Err(self.fail())
    }

    async fn query(
        &self,
        _reference_id: &str,
        _vector: &FeatureVector,
        _k: usize,
    ) -> StoreResult<Vec<SimilarityResult>> {
        Err(self.fail())
    }
}

/// Remote stand-in that holds exactly what it is given, backed by a local
/// backend so query semantics match.
struct HealthyBackend {
    inner: LocalBackend,
}

#[async_trait]
impl VectorBackend for HealthyBackend {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn ensure_collection(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn upsert(&self, frame: &Frame, vector: &FeatureVector) -> StoreResult<()> {
        self.inner.upsert(frame, vector).await
    }

    async fn fetch_vector(&self, frame_id: &str) -> StoreResult<Option<FeatureVector>> {
        self.inner.fetch_vector(frame_id).await
    }

    async fn query(
        &self,
        reference_id: &str,
        vector: &FeatureVector,
        k: usize,
    ) -> StoreResult<Vec<SimilarityResult>> {
        self.inner.query(reference_id, vector, k).await
    }
}

fn frame(index: usize) -> Frame {
    Frame::from_sequence(
        "vid",
        index,
        2.0,
        PathBuf::from(format!("frames/vid/frame_{:04}.jpg", index + 1)),
    )
}

fn vector(seed: usize) -> FeatureVector {
    let values = (0..FEATURE_DIMENSIONS)
        .map(|i| ((i * 7 + seed * 13) % 17) as f32 + 1.0)
        .collect();
    FeatureVector::new(values).unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_remote_writes_land_locally() {
    let remote = Arc::new(UnreachableBackend::default());
    let dyn_remote: DynVectorBackend = remote.clone();
    let store = VectorStore::with_backends(Some(dyn_remote), LocalBackend::new());
    store.initialize().await.unwrap();
    assert!(store.remote_active());

    for index in 0..10 {
        let placement = store.upsert(&frame(index), &vector(index)).await.unwrap();
        assert_eq!(placement, Placement::Local);
    }
    assert_eq!(store.local().len().await, 10);
    assert_eq!(remote.calls.load(Ordering::SeqCst), 10);

    let results = store.query("vid_frame_0001", 3).await.unwrap();
    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| r.frame.id != "vid_frame_0001"));
    assert!(results.windows(2).all(|pair| pair[0].score >= pair[1].score));
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_initialization_disables_remote() {
    let remote = Arc::new(UnreachableBackend {
        fail_init: true,
        ..UnreachableBackend::default()
    });
    let dyn_remote: DynVectorBackend = remote.clone();
    let store = VectorStore::with_backends(Some(dyn_remote), LocalBackend::new());
    store.initialize().await.unwrap();
    assert!(!store.remote_active());

    store.upsert(&frame(0), &vector(0)).await.unwrap();
    store.fetch_vector("vid_frame_0001").await.unwrap();
    assert_eq!(remote.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn healthy_remote_takes_writes_and_queries() {
    let remote: DynVectorBackend = Arc::new(HealthyBackend {
        inner: LocalBackend::new(),
    });
    let store = VectorStore::with_backends(Some(remote), LocalBackend::new());
    store.initialize().await.unwrap();

    for index in 0..4 {
        let placement = store.upsert(&frame(index), &vector(index)).await.unwrap();
        assert_eq!(placement, Placement::Remote);
    }
    assert!(store.local().is_empty().await);

    let results = store.query("vid_frame_0002", 10).await.unwrap();
    assert_eq!(results.len(), 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn reference_held_only_locally_is_still_queryable() {
    let remote: DynVectorBackend = Arc::new(HealthyBackend {
        inner: LocalBackend::new(),
    });
    let local = LocalBackend::new();
    local.upsert(&frame(0), &vector(0)).await.unwrap();
    local.upsert(&frame(1), &vector(1)).await.unwrap();
    let store = VectorStore::with_backends(Some(remote), local);
    store.initialize().await.unwrap();

    let results = store.query("vid_frame_0001", 5).await.unwrap();
    let ids: Vec<&str> = results.iter().map(|r| r.frame.id.as_str()).collect();
    assert_eq!(ids, ["vid_frame_0002"]);
}

#[tokio::test]
async fn missing_reference_is_not_found_and_zero_k_is_empty() {
    let store = VectorStore::local_only(LocalBackend::new());
    store.initialize().await.unwrap();
    store.upsert(&frame(0), &vector(0)).await.unwrap();

    assert!(matches!(
        store.query("vid_frame_0099", 3).await,
        Err(StoreError::NotFound { .. })
    ));
    assert!(matches!(
        store.fetch_vector("vid_frame_0099").await,
        Err(StoreError::NotFound { .. })
    ));
    assert!(store.query("vid_frame_0001", 0).await.unwrap().is_empty());
    assert!(store.query("vid_frame_0099", 0).await.unwrap().is_empty());
}

/// Remote stand-in whose reads exceed their deadline.
struct SlowBackend;

#[async_trait]
impl VectorBackend for SlowBackend {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn ensure_collection(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn upsert(&self, _frame: &Frame, _vector: &FeatureVector) -> StoreResult<()> {
        Ok(())
    }

    async fn fetch_vector(&self, _frame_id: &str) -> StoreResult<Option<FeatureVector>> {
        Err(StoreError::Timeout {
            backend: "remote",
            timeout: std::time::Duration::from_secs(10),
        })
    }

    async fn query(
        &self,
        _reference_id: &str,
        _vector: &FeatureVector,
        _k: usize,
    ) -> StoreResult<Vec<SimilarityResult>> {
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn remote_outage_with_reference_missing_locally_is_not_reported_as_not_found() {
    let remote: DynVectorBackend = Arc::new(UnreachableBackend::default());
    let store = VectorStore::with_backends(Some(remote), LocalBackend::new());
    store.initialize().await.unwrap();
    assert!(matches!(
        store.query("vid_frame_0001", 3).await,
        Err(StoreError::Query { .. })
    ));

    let slow: DynVectorBackend = Arc::new(SlowBackend);
    let store = VectorStore::with_backends(Some(slow), LocalBackend::new());
    store.initialize().await.unwrap();
    assert!(matches!(
        store.query("vid_frame_0001", 3).await,
        Err(StoreError::Timeout { .. })
    ));

    store.local().upsert(&frame(0), &vector(0)).await.unwrap();
    store.local().upsert(&frame(1), &vector(1)).await.unwrap();
    let results = store.query("vid_frame_0001", 3).await.unwrap();
    assert_eq!(results.len(), 1);
}

#[tokio::test]
async fn persisted_store_is_reloaded_by_connect() {
    let dir = tempfile::tempdir().unwrap();
    let config = framescope_store::StoreConfig {
        remote: None,
        snapshot_path: Some(dir.path().join("vectors.json")),
    };
    let store = VectorStore::connect(&config).await.unwrap();
    store.upsert(&frame(0), &vector(0)).await.unwrap();
    store.upsert(&frame(1), &vector(1)).await.unwrap();
    store.persist().await.unwrap();

    let reopened = VectorStore::connect(&config).await.unwrap();
    let results = reopened.query("vid_frame_0002", 1).await.unwrap();
    assert_eq!(results[0].frame.id, "vid_frame_0001");
}
