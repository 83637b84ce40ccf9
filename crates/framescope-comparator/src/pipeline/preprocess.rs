use std::path::Path;

use image::imageops::FilterType;
use image::{DynamicImage, RgbImage};

use crate::error::{DescriptorError, DescriptorResult};

/// Side length every frame is resized to before its histogram is taken.
pub const CANONICAL_SIZE: u32 = 256;

/// Decodes the frame image at `path`.
pub fn open_frame(path: &Path) -> DescriptorResult<DynamicImage> {
    image::open(path).map_err(|source| DescriptorError::Decode {
        path: path.to_path_buf(),
        source,
    })
}

/// Resizes to `CANONICAL_SIZE` x `CANONICAL_SIZE` RGB, ignoring aspect ratio.
pub fn canonicalize(image: &DynamicImage) -> RgbImage {
    if image.width() == CANONICAL_SIZE && image.height() == CANONICAL_SIZE {
        return image.to_rgb8();
    }
    image
        .resize_exact(CANONICAL_SIZE, CANONICAL_SIZE, FilterType::Triangle)
        .to_rgb8()
}
