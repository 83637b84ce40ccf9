use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use framescope_comparator::{SimilarityError, is_degenerate};
use framescope_types::{FeatureVector, Frame, SimilarityResult};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::backend::{DynVectorBackend, VectorBackend};
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::local::LocalBackend;
use crate::remote::RemoteBackend;

/// Backend that accepted a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Placement {
    Remote,
    Local,
}

impl Placement {
    pub fn as_str(&self) -> &'static str {
        match self {
            Placement::Remote => "remote",
            Placement::Local => "local",
        }
    }
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Vector store with an optional remote index in front of the local backend.
///
/// Writes go to the remote index while it is active and fall back to the
/// local backend when a remote call fails. Reads consult the remote index
/// first and the local backend second, so a frame written during a remote
/// outage stays reachable. Nothing copies fallback writes back to the remote
/// index once it recovers.
pub struct VectorStore {
    remote: Option<DynVectorBackend>,
    remote_active: AtomicBool,
    local: Arc<LocalBackend>,
}

impl VectorStore {
    pub fn local_only(local: LocalBackend) -> Self {
        Self::with_backends(None, local)
    }

    pub fn with_backends(remote: Option<DynVectorBackend>, local: LocalBackend) -> Self {
        let remote_active = AtomicBool::new(remote.is_some());
        Self {
            remote,
            remote_active,
            local: Arc::new(local),
        }
    }

    /// Builds the backends described by `config` and initializes them.
    pub async fn connect(config: &StoreConfig) -> StoreResult<Self> {
        let local = match &config.snapshot_path {
            Some(path) => LocalBackend::with_snapshot(path).await?,
            None => LocalBackend::new(),
        };
        let remote = match &config.remote {
            Some(remote) => {
                let backend: DynVectorBackend = Arc::new(RemoteBackend::new(remote)?);
                Some(backend)
            }
            None => None,
        };
        let store = Self::with_backends(remote, local);
        store.initialize().await?;
        Ok(store)
    }

    /// Prepares every backend. A remote index that cannot be prepared is
    /// disabled for the lifetime of the store.
    pub async fn initialize(&self) -> StoreResult<()> {
        self.local.ensure_collection().await?;
        if let Some(remote) = self.active_remote() {
            match remote.ensure_collection().await {
                Ok(()) => info!(backend = remote.name(), "remote vector index ready"),
                Err(err) => {
                    warn!(
                        backend = remote.name(),
                        error = %err,
                        "remote vector index unavailable, using local store only"
                    );
                    self.remote_active.store(false, Ordering::SeqCst);
                }
            }
        } else {
            info!("no remote vector index configured, using local store only");
        }
        Ok(())
    }

    pub fn remote_active(&self) -> bool {
        self.active_remote().is_some()
    }

    pub fn local(&self) -> &LocalBackend {
        &self.local
    }

    fn active_remote(&self) -> Option<&DynVectorBackend> {
        self.remote
            .as_ref()
            .filter(|_| self.remote_active.load(Ordering::SeqCst))
    }

    pub async fn upsert(&self, frame: &Frame, vector: &FeatureVector) -> StoreResult<Placement> {
        if let Some(remote) = self.active_remote() {
            match remote.upsert(frame, vector).await {
                Ok(()) => return Ok(Placement::Remote),
                Err(err) => warn!(
                    frame_id = %frame.id,
                    error = %err,
                    "remote upsert failed, writing to local store"
                ),
            }
        }
        self.local.upsert(frame, vector).await?;
        Ok(Placement::Local)
    }

    /// Vector stored for `frame_id` in whichever backend holds it.
    pub async fn lookup(&self, frame_id: &str) -> StoreResult<Option<FeatureVector>> {
        if let Some(remote) = self.active_remote() {
            match remote.fetch_vector(frame_id).await {
                Ok(Some(vector)) => return Ok(Some(vector)),
                Ok(None) => debug!(frame_id, "frame absent from remote index"),
                Err(err) => warn!(frame_id, error = %err, "remote fetch failed, trying local store"),
            }
        }
        self.local.fetch_vector(frame_id).await
    }

    pub async fn fetch_vector(&self, frame_id: &str) -> StoreResult<FeatureVector> {
        self.lookup(frame_id)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                frame_id: frame_id.to_string(),
            })
    }

    /// Up to `k` frames most similar to `reference_id`, best first.
    ///
    /// The query runs on the backend that holds the reference vector. When the
    /// remote index fails and the local backend lacks the reference, the
    /// remote error is reported (a timeout as itself, anything else as a
    /// query failure) rather than `NotFound`.
    pub async fn query(&self, reference_id: &str, k: usize) -> StoreResult<Vec<SimilarityResult>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let mut remote_failure = None;
        if let Some(remote) = self.active_remote() {
            match remote.fetch_vector(reference_id).await {
                Ok(Some(vector)) => {
                    ensure_usable(&vector)?;
                    match remote.query(reference_id, &vector, k).await {
                        Ok(results) => return Ok(results),
                        Err(err) => {
                            warn!(reference_id, error = %err, "remote query failed, trying local store");
                            remote_failure = Some(err);
                        }
                    }
                }
                Ok(None) => debug!(reference_id, "reference absent from remote index"),
                Err(err) => {
                    warn!(reference_id, error = %err, "remote fetch failed, trying local store");
                    remote_failure = Some(err);
                }
            }
        }

        match self.local.fetch_vector(reference_id).await? {
            Some(vector) => self.local.query(reference_id, &vector, k).await,
            None => Err(match remote_failure {
                Some(err @ StoreError::Timeout { .. }) => err,
                Some(err) => StoreError::Query {
                    frame_id: reference_id.to_string(),
                    message: err.to_string(),
                },
                None => StoreError::NotFound {
                    frame_id: reference_id.to_string(),
                },
            }),
        }
    }

    /// Flushes the local backend to its snapshot, if it has one.
    pub async fn persist(&self) -> StoreResult<()> {
        self.local.save().await
    }
}

fn ensure_usable(vector: &FeatureVector) -> StoreResult<()> {
    if is_degenerate(vector.as_slice()) {
        return Err(SimilarityError::DegenerateVector.into());
    }
    Ok(())
}
