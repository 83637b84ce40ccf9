#![cfg(feature = "backend-mock")]

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use framescope_types::Frame;
use image::{Rgb, RgbImage};
use tokio::task;

use crate::catalog::FrameCatalog;
use crate::config::MockSettings;
use crate::core::{ExtractError, ExtractResult, ExtractionRequest, FrameExtractor, VideoMetadata};
use crate::sequence::frame_filename;

const BACKEND_NAME: &str = "mock";
const FRAME_EXTENSION: &str = "png";
const EPSILON: f64 = 1e-9;

/// Renders a deterministic synthetic video instead of decoding the input.
///
/// Frame `n` is a gradient tinted by `n`, so frames differ from each other but
/// two runs with the same settings write identical images.
#[derive(Debug, Clone)]
pub struct MockExtractor {
    catalog: FrameCatalog,
    settings: MockSettings,
}

impl MockExtractor {
    pub fn new(catalog: FrameCatalog, settings: MockSettings) -> Self {
        Self { catalog, settings }
    }

    pub fn frame_count(&self, interval_seconds: f64) -> usize {
        if self.settings.duration_seconds <= 0.0 {
            return 0;
        }
        (self.settings.duration_seconds / interval_seconds + EPSILON).floor() as usize
    }
}

#[async_trait]
impl FrameExtractor for MockExtractor {
    fn name(&self) -> &'static str {
        BACKEND_NAME
    }

    fn catalog(&self) -> &FrameCatalog {
        &self.catalog
    }

    async fn extract(&self, request: &ExtractionRequest) -> ExtractResult<Vec<Frame>> {
        let output_dir = self
            .catalog
            .prepare(request.video_id(), FRAME_EXTENSION)
            .await?;
        let count = self.frame_count(request.interval_seconds());
        let settings = self.settings;
        task::spawn_blocking(move || render_frames(&output_dir, count, settings))
            .await
            .map_err(|err| {
                ExtractError::extraction(
                    BACKEND_NAME,
                    request.video_path(),
                    format!("render task failed: {err}"),
                )
            })??;
        self.catalog
            .collect(request, BACKEND_NAME, FRAME_EXTENSION)
            .await
    }

    async fn probe(&self, _video_path: &Path) -> ExtractResult<VideoMetadata> {
        Ok(VideoMetadata {
            duration_seconds: Some(self.settings.duration_seconds),
            width: Some(self.settings.width),
            height: Some(self.settings.height),
        })
    }
}

fn render_frames(dir: &Path, count: usize, settings: MockSettings) -> ExtractResult<()> {
    for index in 0..count {
        let path: PathBuf = dir.join(frame_filename(index + 1, FRAME_EXTENSION));
        synthetic_frame(index, settings.width, settings.height)
            .save(&path)
            .map_err(|err| {
                ExtractError::extraction(BACKEND_NAME, &path, format!("failed to write: {err}"))
            })?;
    }
    Ok(())
}

fn synthetic_frame(index: usize, width: u32, height: u32) -> RgbImage {
    let tint = ((index * 53) % 256) as u32;
    let width = width.max(1);
    let height = height.max(1);
    RgbImage::from_fn(width, height, |x, y| {
        let r = (tint + x * 255 / width) % 256;
        let g = (tint * 3 + y * 255 / height) % 256;
        let b = (255 - tint + (x + y) % 32) % 256;
        Rgb([r as u8, g as u8, b as u8])
    })
}
