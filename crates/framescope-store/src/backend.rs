use std::sync::Arc;

use async_trait::async_trait;
use framescope_types::{FeatureVector, Frame, SimilarityResult};

use crate::error::StoreResult;

/// Capability set shared by the remote index and the in-process store.
#[async_trait]
pub trait VectorBackend: Send + Sync {
    /// Stable backend name used for logging and diagnostics.
    fn name(&self) -> &'static str;

    /// Makes sure the backing collection exists. Idempotent.
    async fn ensure_collection(&self) -> StoreResult<()>;

    /// Inserts or replaces the vector stored for `frame.id`.
    async fn upsert(&self, frame: &Frame, vector: &FeatureVector) -> StoreResult<()>;

    async fn fetch_vector(&self, frame_id: &str) -> StoreResult<Option<FeatureVector>>;

    /// Frames most similar to `vector`, best first, never including
    /// `reference_id`, at most `k` entries.
    async fn query(
        &self,
        reference_id: &str,
        vector: &FeatureVector,
        k: usize,
    ) -> StoreResult<Vec<SimilarityResult>>;
}

pub type DynVectorBackend = Arc<dyn VectorBackend>;
