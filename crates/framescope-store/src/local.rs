use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use framescope_comparator::{SimilarityError, cosine_similarity, is_degenerate, rank_top_k};
use framescope_types::{FeatureVector, Frame, SimilarityResult};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::backend::VectorBackend;
use crate::error::{StoreError, StoreResult};

const BACKEND_NAME: &str = "local";

#[derive(Debug, Default)]
struct Entries {
    order: Vec<String>,
    records: HashMap<String, (Frame, FeatureVector)>,
}

impl Entries {
    fn insert(&mut self, frame: Frame, vector: FeatureVector) {
        if !self.records.contains_key(&frame.id) {
            self.order.push(frame.id.clone());
        }
        self.records.insert(frame.id.clone(), (frame, vector));
    }
}

/// In-process store with brute-force cosine search.
///
/// Entries keep insertion order; re-inserting an id replaces the record in
/// place, so ties in a query resolve in first-insertion order.
#[derive(Debug, Default)]
pub struct LocalBackend {
    entries: RwLock<Entries>,
    snapshot: Option<PathBuf>,
}

impl LocalBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend persisted to a JSON snapshot at `path`. Entries already in the
    /// snapshot are loaded; a missing file starts empty.
    pub async fn with_snapshot(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        let mut entries = Entries::default();
        for mut frame in read_snapshot(&path).await? {
            match frame.feature_vector.take() {
                Some(vector) => entries.insert(frame, vector),
                None => debug!(frame_id = %frame.id, "snapshot entry without vector skipped"),
            }
        }
        debug!(
            path = %path.display(),
            entries = entries.order.len(),
            "loaded local snapshot"
        );
        Ok(Self {
            entries: RwLock::new(entries),
            snapshot: Some(path),
        })
    }

    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot.as_deref()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.order.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Frame ids in insertion order.
    pub async fn frame_ids(&self) -> Vec<String> {
        self.entries.read().await.order.clone()
    }

    /// Writes every entry to the snapshot file, if one is configured.
    ///
    /// The whole file is replaced through a fixed `<name>.json.tmp` staging
    /// path. Processes sharing one snapshot are not coordinated: when two save
    /// concurrently the last rename wins and the other's entries are lost.
    pub async fn save(&self) -> StoreResult<()> {
        let Some(path) = self.snapshot.as_deref() else {
            return Ok(());
        };
        let frames: Vec<Frame> = {
            let entries = self.entries.read().await;
            entries
                .order
                .iter()
                .filter_map(|id| entries.records.get(id))
                .map(|(frame, vector)| frame.metadata().with_feature_vector(vector.clone()))
                .collect()
        };
        let encoded = serde_json::to_vec(&frames).map_err(|err| StoreError::Snapshot {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, encoded).await?;
        fs::rename(&staging, path).await?;
        debug!(path = %path.display(), entries = frames.len(), "saved local snapshot");
        Ok(())
    }
}

async fn read_snapshot(path: &Path) -> StoreResult<Vec<Frame>> {
    let contents = match fs::read(path).await {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err.into()),
    };
    serde_json::from_slice(&contents).map_err(|err| StoreError::Snapshot {
        path: path.to_path_buf(),
        message: err.to_string(),
    })
}

#[async_trait]
impl VectorBackend for LocalBackend {
    fn name(&self) -> &'static str {
        BACKEND_NAME
    }

    async fn ensure_collection(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn upsert(&self, frame: &Frame, vector: &FeatureVector) -> StoreResult<()> {
        self.entries
            .write()
            .await
            .insert(frame.metadata(), vector.clone());
        Ok(())
    }

    async fn fetch_vector(&self, frame_id: &str) -> StoreResult<Option<FeatureVector>> {
        let entries = self.entries.read().await;
        Ok(entries
            .records
            .get(frame_id)
            .map(|(_, vector)| vector.clone()))
    }

    async fn query(
        &self,
        reference_id: &str,
        vector: &FeatureVector,
        k: usize,
    ) -> StoreResult<Vec<SimilarityResult>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        if is_degenerate(vector.as_slice()) {
            return Err(SimilarityError::DegenerateVector.into());
        }
        let entries = self.entries.read().await;
        let mut scored = Vec::with_capacity(entries.order.len());
        for id in entries.order.iter().filter(|id| id.as_str() != reference_id) {
            let Some((frame, candidate)) = entries.records.get(id) else {
                continue;
            };
            match cosine_similarity(vector.as_slice(), candidate.as_slice()) {
                Ok(score) => scored.push((frame, score)),
                Err(SimilarityError::DegenerateVector) => {
                    warn!(frame_id = %id, "skipping zero-magnitude candidate vector");
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(rank_top_k(scored, k)
            .into_iter()
            .map(|(frame, score)| SimilarityResult::new(frame, score))
            .collect())
    }
}
