use framescope_types::FeatureVector;
use image::DynamicImage;

use crate::descriptors::FrameDescriptor;
use crate::error::DescriptorResult;
use crate::pipeline::ops::{channel_counts, normalize};
use crate::pipeline::preprocess::canonicalize;

const DESCRIPTOR_NAME: &str = "color-histogram";

/// 64-bin per-channel RGB histogram of the frame resized to the canonical
/// resolution. Each channel sums to 1.
#[derive(Debug, Clone, Copy, Default)]
pub struct ColorHistogramDescriptor;

impl ColorHistogramDescriptor {
    pub fn new() -> Self {
        Self
    }
}

impl FrameDescriptor for ColorHistogramDescriptor {
    fn name(&self) -> &'static str {
        DESCRIPTOR_NAME
    }

    fn describe(&self, image: &DynamicImage) -> DescriptorResult<FeatureVector> {
        let canonical = canonicalize(image);
        let counts = channel_counts(&canonical);
        let values = normalize(&counts, canonical.width() * canonical.height());
        Ok(FeatureVector::new(values)?)
    }
}
