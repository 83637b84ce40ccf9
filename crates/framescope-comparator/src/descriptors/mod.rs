pub mod color_histogram;

pub use color_histogram::ColorHistogramDescriptor;

use std::path::{Path, PathBuf};

use framescope_types::FeatureVector;
use image::DynamicImage;
use rayon::prelude::*;
use tracing::debug;

use crate::error::DescriptorResult;
use crate::pipeline::open_frame;

/// Trait implemented by every frame descriptor.
pub trait FrameDescriptor: Send + Sync {
    /// Stable descriptor name used for logging and diagnostics.
    fn name(&self) -> &'static str;

    /// Computes the descriptor of an already decoded image.
    fn describe(&self, image: &DynamicImage) -> DescriptorResult<FeatureVector>;

    /// Decodes the image at `path` and computes its descriptor.
    fn describe_path(&self, path: &Path) -> DescriptorResult<FeatureVector> {
        self.describe(&open_frame(path)?)
    }
}

/// Describes every path on the rayon pool. Results keep the order of `paths`;
/// one failing image does not affect the others.
pub fn compute_batch<D>(descriptor: &D, paths: &[PathBuf]) -> Vec<DescriptorResult<FeatureVector>>
where
    D: FrameDescriptor + ?Sized,
{
    debug!(
        descriptor = descriptor.name(),
        frames = paths.len(),
        threads = rayon::current_num_threads(),
        "describing frames"
    );
    paths
        .par_iter()
        .map(|path| descriptor.describe_path(path))
        .collect()
}
