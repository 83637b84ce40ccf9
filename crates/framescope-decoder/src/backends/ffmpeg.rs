#![cfg(feature = "backend-ffmpeg")]

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use framescope_types::Frame;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, info};

use crate::catalog::FrameCatalog;
use crate::core::{ExtractError, ExtractResult, ExtractionRequest, FrameExtractor, VideoMetadata};
use crate::sequence::output_pattern;

const BACKEND_NAME: &str = "ffmpeg";
const FRAME_EXTENSION: &str = "jpg";
const DIAGNOSTIC_TAIL_LINES: usize = 8;

/// Samples frames by running the `ffmpeg` command line tool.
pub struct FfmpegExtractor {
    catalog: FrameCatalog,
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    timeout: Option<Duration>,
}

impl FfmpegExtractor {
    pub fn new(
        catalog: FrameCatalog,
        ffmpeg: PathBuf,
        ffprobe: PathBuf,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            catalog,
            ffmpeg,
            ffprobe,
            timeout,
        }
    }

    fn extraction_command(&self, request: &ExtractionRequest, output_dir: &Path) -> Command {
        let mut command = Command::new(&self.ffmpeg);
        command
            .args(extraction_args(
                request.video_path(),
                request.interval_seconds(),
                &output_dir.join(output_pattern(FRAME_EXTENSION)),
            ))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }

    /// Runs `command` to completion and returns its stdout. The child is
    /// killed when the timeout elapses.
    async fn run(&self, mut command: Command, video_path: &Path) -> ExtractResult<Vec<u8>> {
        let program = command.as_std().get_program().to_string_lossy().into_owned();
        let child = command.spawn().map_err(|err| {
            ExtractError::extraction(
                BACKEND_NAME,
                video_path,
                format!("failed to spawn {program}: {err}"),
            )
        })?;

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| ExtractError::Timeout {
                    backend: BACKEND_NAME,
                    timeout: limit,
                })??,
            None => child.wait_with_output().await?,
        };

        if !output.status.success() {
            return Err(ExtractError::extraction(
                BACKEND_NAME,
                video_path,
                format!(
                    "{program} exited with {}: {}",
                    output.status,
                    diagnostic_tail(&output.stderr)
                ),
            ));
        }
        Ok(output.stdout)
    }
}

#[async_trait]
impl FrameExtractor for FfmpegExtractor {
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
        let command = self.extraction_command(request, &output_dir);
        debug!(
            video_id = request.video_id(),
            command = ?command.as_std(),
            "spawning frame decoder"
        );

        let started = Instant::now();
        self.run(command, request.video_path()).await?;
        let frames = self
            .catalog
            .collect(request, BACKEND_NAME, FRAME_EXTENSION)
            .await?;
        info!(
            video_id = request.video_id(),
            frames = frames.len(),
            elapsed = ?started.elapsed(),
            "extracted frames"
        );
        Ok(frames)
    }

    async fn probe(&self, video_path: &Path) -> ExtractResult<VideoMetadata> {
        let mut command = Command::new(&self.ffprobe);
        command
            .args([
                "-v",
                "error",
                "-select_streams",
                "v:0",
                "-show_entries",
                "stream=width,height:format=duration",
                "-of",
                "json",
            ])
            .arg(video_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        let stdout = self
            .run(command, video_path)
            .await
            .map_err(|err| match err {
                ExtractError::Extraction { message, .. } => ExtractError::Probe {
                    path: video_path.to_path_buf(),
                    message,
                },
                other => other,
            })?;
        parse_probe_output(&stdout).map_err(|err| ExtractError::Probe {
            path: video_path.to_path_buf(),
            message: err.to_string(),
        })
    }
}

fn extraction_args(video_path: &Path, interval_seconds: f64, pattern: &Path) -> Vec<String> {
    vec![
        "-hide_banner".into(),
        "-loglevel".into(),
        "error".into(),
        "-y".into(),
        "-i".into(),
        video_path.to_string_lossy().into_owned(),
        "-vf".into(),
        format!("fps=1/{interval_seconds}"),
        "-q:v".into(),
        "2".into(),
        pattern.to_string_lossy().into_owned(),
    ]
}

fn diagnostic_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    if lines.is_empty() {
        return "no diagnostic output".to_string();
    }
    let start = lines.len().saturating_sub(DIAGNOSTIC_TAIL_LINES);
    lines[start..].join(" | ")
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ProbeOutput {
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ProbeFormat {
    duration: Option<String>,
}

fn parse_probe_output(stdout: &[u8]) -> Result<VideoMetadata, serde_json::Error> {
    let parsed: ProbeOutput = serde_json::from_slice(stdout)?;
    let stream = parsed.streams.into_iter().next().unwrap_or_default();
    let duration_seconds = parsed
        .format
        .and_then(|format| format.duration)
        .and_then(|value| value.trim().parse::<f64>().ok())
        .filter(|value| value.is_finite() && *value >= 0.0);
    Ok(VideoMetadata {
        duration_seconds,
        width: stream.width,
        height: stream.height,
    })
}
