use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use tokio::process::Command;

use crate::catalog::FrameCatalog;
use crate::core::{DynFrameExtractor, ExtractError, ExtractResult};

const DEFAULT_FRAMES_ROOT: &str = "frames";
const DEFAULT_DECODE_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Ffmpeg,
    Mock,
}

impl FromStr for Backend {
    type Err = ExtractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ffmpeg" => Ok(Backend::Ffmpeg),
            "mock" => Ok(Backend::Mock),
            other => Err(ExtractError::configuration(format!(
                "unknown decoder backend '{other}'"
            ))),
        }
    }
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Ffmpeg => "ffmpeg",
            Backend::Mock => "mock",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Synthetic video rendered by the mock backend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MockSettings {
    pub duration_seconds: f64,
    pub width: u32,
    pub height: u32,
}

impl Default for MockSettings {
    fn default() -> Self {
        Self {
            duration_seconds: 10.0,
            width: 64,
            height: 48,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Configuration {
    pub backend: Backend,
    pub frames_root: PathBuf,
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
    pub timeout: Option<Duration>,
    pub mock: MockSettings,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            backend: Backend::Ffmpeg,
            frames_root: PathBuf::from(DEFAULT_FRAMES_ROOT),
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
            timeout: Some(DEFAULT_DECODE_TIMEOUT),
            mock: MockSettings::default(),
        }
    }
}

impl Configuration {
    pub fn from_env() -> ExtractResult<Self> {
        let mut config = Configuration::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Overrides fields from `FRAMESCOPE_*` environment variables.
    pub fn apply_env(&mut self) -> ExtractResult<()> {
        if let Ok(backend) = env::var("FRAMESCOPE_DECODER_BACKEND") {
            self.backend = Backend::from_str(&backend)?;
        }
        if let Ok(path) = env::var("FRAMESCOPE_FRAMES_DIR") {
            self.frames_root = PathBuf::from(path);
        }
        if let Ok(path) = env::var("FRAMESCOPE_FFMPEG") {
            self.ffmpeg = PathBuf::from(path);
        }
        if let Ok(path) = env::var("FRAMESCOPE_FFPROBE") {
            self.ffprobe = PathBuf::from(path);
        }
        if let Ok(value) = env::var("FRAMESCOPE_DECODE_TIMEOUT_SECS") {
            let secs: u64 = value.trim().parse().map_err(|_| {
                ExtractError::configuration(format!(
                    "failed to parse FRAMESCOPE_DECODE_TIMEOUT_SECS='{value}' as whole seconds"
                ))
            })?;
            self.timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        Ok(())
    }

    pub fn catalog(&self) -> FrameCatalog {
        FrameCatalog::new(self.frames_root.clone())
    }

    /// Backends compiled into this build whose runtime requirements are met.
    pub async fn available_backends(&self) -> Vec<Backend> {
        let mut backends = Vec::new();
        if cfg!(feature = "backend-ffmpeg") && tool_runs(&self.ffmpeg).await {
            backends.push(Backend::Ffmpeg);
        }
        if cfg!(feature = "backend-mock") {
            backends.push(Backend::Mock);
        }
        backends
    }

    pub fn create_extractor(&self) -> ExtractResult<DynFrameExtractor> {
        let catalog = self.catalog();
        match self.backend {
            Backend::Ffmpeg => {
                #[cfg(feature = "backend-ffmpeg")]
                {
                    Ok(Arc::new(crate::backends::ffmpeg::FfmpegExtractor::new(
                        catalog,
                        self.ffmpeg.clone(),
                        self.ffprobe.clone(),
                        self.timeout,
                    )))
                }
                #[cfg(not(feature = "backend-ffmpeg"))]
                {
                    let _ = catalog;
                    Err(ExtractError::unsupported("ffmpeg"))
                }
            }
            Backend::Mock => {
                #[cfg(feature = "backend-mock")]
                {
                    Ok(Arc::new(crate::backends::mock::MockExtractor::new(
                        catalog, self.mock,
                    )))
                }
                #[cfg(not(feature = "backend-mock"))]
                {
                    let _ = catalog;
                    Err(ExtractError::unsupported("mock"))
                }
            }
        }
    }
}

async fn tool_runs(program: &Path) -> bool {
    Command::new(program)
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .status()
        .await
        .map(|status| status.success())
        .unwrap_or(false)
}
