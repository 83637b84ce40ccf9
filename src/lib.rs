//! Frame feature pipeline: sample a video into frames, describe each frame
//! with a color histogram, index the descriptors and answer "find frames
//! similar to this one" queries.

pub mod cli;
pub mod error;
pub mod pipeline;
pub mod progress;
pub mod settings;

use std::sync::Arc;

use framescope_decoder::{DynFrameExtractor, ExtractError};
use framescope_store::VectorStore;

pub use error::{ErrorKind, PipelineError, PipelineResult};
pub use pipeline::{IngestReport, MAX_SIMILAR_RESULTS, Pipeline, SimilarityQuery};
pub use settings::{ConfigError, EffectiveSettings};

/// Creates the extractor selected by `settings`, failing when its backend is
/// not compiled in or its tools are missing.
pub async fn build_extractor(settings: &EffectiveSettings) -> PipelineResult<DynFrameExtractor> {
    let available = settings.decoder.available_backends().await;
    if available.is_empty() {
        return Err(ExtractError::configuration(
            "no decoder backend available; install ffmpeg or rebuild with the \"backend-mock\" feature",
        )
        .into());
    }
    if !available.contains(&settings.decoder.backend) {
        return Err(ExtractError::configuration(format!(
            "decoder backend '{}' is not available (available: {})",
            settings.decoder.backend,
            available
                .iter()
                .map(|backend| backend.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ))
        .into());
    }
    Ok(settings.decoder.create_extractor()?)
}

/// Connects the vector store and assembles the pipeline.
pub async fn build_pipeline(settings: &EffectiveSettings) -> PipelineResult<Pipeline> {
    let extractor = build_extractor(settings).await?;
    let store = VectorStore::connect(&settings.store).await?;
    Ok(Pipeline::new(extractor, Arc::new(store)))
}

/// Assembles a pipeline that only answers queries over frames already
/// extracted and stored. The decoder backend is neither checked nor needed.
pub async fn build_query_pipeline(settings: &EffectiveSettings) -> PipelineResult<Pipeline> {
    let store = VectorStore::connect(&settings.store).await?;
    Ok(Pipeline::query_only(settings.decoder.catalog(), Arc::new(store)))
}
