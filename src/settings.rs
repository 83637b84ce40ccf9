use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use directories::{BaseDirs, ProjectDirs};
use framescope_decoder::{Backend, Configuration, MockSettings};
use framescope_store::{RemoteConfig, StoreConfig};
use serde::Deserialize;

use crate::cli::{CliArgs, CliSources, Command, DEFAULT_INTERVAL_SECONDS};

const CONFIG_FILENAME: &str = "framescope.toml";
const SNAPSHOT_FILENAME: &str = "vectors.json";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    backend: Option<String>,
    frames_dir: Option<String>,
    snapshot: Option<String>,
    interval_seconds: Option<f64>,
    ffmpeg: Option<String>,
    ffprobe: Option<String>,
    decode_timeout_secs: Option<u64>,
    remote: Option<RemoteFileConfig>,
    mock: Option<MockFileConfig>,
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(default)]
struct RemoteFileConfig {
    url: Option<String>,
    api_key: Option<String>,
    collection: Option<String>,
    timeout_secs: Option<u64>,
    score_threshold: Option<f32>,
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(default)]
struct MockFileConfig {
    duration_seconds: Option<f64>,
    width: Option<u32>,
    height: Option<u32>,
}

/// Settings after merging defaults, the config file, the environment and
/// the command line, in increasing precedence.
#[derive(Debug, Clone)]
pub struct EffectiveSettings {
    pub decoder: Configuration,
    pub store: StoreConfig,
    pub interval_seconds: f64,
    pub config_path: Option<PathBuf>,
}

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    InvalidValue {
        path: Option<PathBuf>,
        field: &'static str,
        value: String,
    },
    NotFound {
        path: PathBuf,
    },
    Environment {
        message: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(
                    f,
                    "failed to read config file {}: {}",
                    path.display(),
                    source
                )
            }
            ConfigError::Parse { path, source } => {
                write!(
                    f,
                    "failed to parse config file {}: {}",
                    path.display(),
                    source
                )
            }
            ConfigError::InvalidValue { path, field, value } => {
                if let Some(path) = path {
                    write!(
                        f,
                        "invalid value '{}' for '{}' in {}",
                        value,
                        field,
                        path.display()
                    )
                } else {
                    write!(f, "invalid value '{}' for '{}'", value, field)
                }
            }
            ConfigError::NotFound { path } => {
                write!(f, "config file {} does not exist", path.display())
            }
            ConfigError::Environment { message } => f.write_str(message),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
            ConfigError::InvalidValue { .. } => None,
            ConfigError::NotFound { .. } => None,
            ConfigError::Environment { .. } => None,
        }
    }
}

pub fn resolve_settings(
    cli: &CliArgs,
    sources: &CliSources,
) -> Result<EffectiveSettings, ConfigError> {
    let (file, config_path) = load_config(cli.config.as_deref())?;
    merge(cli, sources, file, config_path)
}

fn load_config(path_override: Option<&Path>) -> Result<(FileConfig, Option<PathBuf>), ConfigError> {
    if let Some(path) = path_override {
        let path = path.to_path_buf();
        if !path.exists() {
            return Err(ConfigError::NotFound { path });
        }
        let config = read_config(&path)?;
        return Ok((config, Some(path)));
    }

    let candidates = [project_config_path(), default_config_path()];
    for path in candidates.into_iter().flatten() {
        if path.exists() {
            let config = read_config(&path)?;
            return Ok((config, Some(path)));
        }
    }
    Ok((FileConfig::default(), None))
}

fn read_config(path: &Path) -> Result<FileConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&contents, path)
}

fn parse_config(contents: &str, path: &Path) -> Result<FileConfig, ConfigError> {
    toml::from_str(contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn merge(
    cli: &CliArgs,
    sources: &CliSources,
    file: FileConfig,
    config_path: Option<PathBuf>,
) -> Result<EffectiveSettings, ConfigError> {
    let config_dir = config_path
        .as_ref()
        .and_then(|path| path.parent().map(|dir| dir.to_path_buf()));

    let FileConfig {
        backend: file_backend,
        frames_dir: file_frames_dir,
        snapshot: file_snapshot,
        interval_seconds: file_interval,
        ffmpeg: file_ffmpeg,
        ffprobe: file_ffprobe,
        decode_timeout_secs: file_decode_timeout,
        remote: file_remote,
        mock: file_mock,
    } = file;

    let mut decoder = Configuration::default();
    if let Some(value) = normalize_string(file_backend) {
        decoder.backend = parse_backend(&value, config_path.as_ref())?;
    }
    if let Some(dir) = normalize_string(file_frames_dir)
        .and_then(|dir| resolve_path_from_config(dir, config_dir.as_deref()))
    {
        decoder.frames_root = dir;
    }
    if let Some(path) = normalize_string(file_ffmpeg) {
        decoder.ffmpeg = expand_home_path(&path);
    }
    if let Some(path) = normalize_string(file_ffprobe) {
        decoder.ffprobe = expand_home_path(&path);
    }
    if let Some(secs) = file_decode_timeout {
        decoder.timeout = (secs > 0).then(|| Duration::from_secs(secs));
    }
    if let Some(mock) = file_mock {
        decoder.mock = merge_mock(decoder.mock, mock, config_path.as_ref())?;
    }

    let mut store = StoreConfig {
        remote: None,
        snapshot_path: normalize_string(file_snapshot)
            .and_then(|path| resolve_path_from_config(path, config_dir.as_deref())),
    };
    if let Some(remote) = file_remote {
        store.remote = remote_from_file(remote, config_path.as_ref())?;
    }

    let mut interval_seconds = DEFAULT_INTERVAL_SECONDS;
    if let Some(value) = file_interval {
        interval_seconds = validate_interval(value, config_path.clone())?;
    }

    decoder.apply_env().map_err(|err| ConfigError::Environment {
        message: err.to_string(),
    })?;
    store.apply_env().map_err(|err| ConfigError::Environment {
        message: err.to_string(),
    })?;

    if let Some(value) = normalize_string(cli.backend.clone()) {
        decoder.backend = parse_backend(&value, None)?;
    }
    if let Some(dir) = cli.frames_dir.clone() {
        decoder.frames_root = expand_pathbuf(dir);
    }
    if let Some(path) = cli.snapshot.clone() {
        store.snapshot_path = Some(expand_pathbuf(path));
    }
    if let Some(url) = normalize_string(cli.remote_url.clone()) {
        let mut remote = RemoteConfig::parse(&url).map_err(|_| ConfigError::InvalidValue {
            path: None,
            field: "remote-url",
            value: url.clone(),
        })?;
        if let Some(previous) = store.remote.take() {
            remote.api_key = previous.api_key;
            remote.collection = previous.collection;
            remote.timeout = previous.timeout;
            remote.score_threshold = previous.score_threshold;
        }
        store.remote = Some(remote);
    }
    if cli.local_only {
        store.remote = None;
    }
    if sources.interval_from_cli {
        if let Command::Ingest { interval, .. } = &cli.command {
            interval_seconds = validate_interval(*interval, None)?;
        }
    }

    if store.snapshot_path.is_none() {
        store.snapshot_path = default_snapshot_path();
    }

    Ok(EffectiveSettings {
        decoder,
        store,
        interval_seconds,
        config_path,
    })
}

fn merge_mock(
    mut mock: MockSettings,
    file: MockFileConfig,
    path: Option<&PathBuf>,
) -> Result<MockSettings, ConfigError> {
    if let Some(duration) = file.duration_seconds {
        if !duration.is_finite() || duration < 0.0 {
            return Err(ConfigError::InvalidValue {
                path: path.cloned(),
                field: "mock.duration_seconds",
                value: duration.to_string(),
            });
        }
        mock.duration_seconds = duration;
    }
    if let Some(width) = file.width {
        mock.width = width;
    }
    if let Some(height) = file.height {
        mock.height = height;
    }
    Ok(mock)
}

fn remote_from_file(
    file: RemoteFileConfig,
    path: Option<&PathBuf>,
) -> Result<Option<RemoteConfig>, ConfigError> {
    let Some(url) = normalize_string(file.url) else {
        return Ok(None);
    };
    let invalid = |field: &'static str, value: String| ConfigError::InvalidValue {
        path: path.cloned(),
        field,
        value,
    };
    let mut remote = RemoteConfig::parse(&url).map_err(|_| invalid("remote.url", url.clone()))?;
    remote.api_key = normalize_string(file.api_key);
    if let Some(collection) = normalize_string(file.collection) {
        remote.collection = framescope_store::config::validate_collection(&collection)
            .map_err(|_| invalid("remote.collection", collection.clone()))?;
    }
    if let Some(secs) = file.timeout_secs {
        if secs == 0 {
            return Err(invalid("remote.timeout_secs", secs.to_string()));
        }
        remote.timeout = Duration::from_secs(secs);
    }
    if let Some(threshold) = file.score_threshold {
        if !(-1.0..=1.0).contains(&threshold) {
            return Err(invalid("remote.score_threshold", threshold.to_string()));
        }
        remote.score_threshold = threshold;
    }
    Ok(Some(remote))
}

fn validate_interval(value: f64, path: Option<PathBuf>) -> Result<f64, ConfigError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ConfigError::InvalidValue {
            path,
            field: "interval_seconds",
            value: value.to_string(),
        });
    }
    Ok(value)
}

fn parse_backend(value: &str, path: Option<&PathBuf>) -> Result<Backend, ConfigError> {
    Backend::from_str(value).map_err(|_| ConfigError::InvalidValue {
        path: path.cloned(),
        field: "backend",
        value: value.to_string(),
    })
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("rs", "framescope", "framescope")
}

fn default_config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
}

fn project_config_path() -> Option<PathBuf> {
    env::current_dir().ok().map(|dir| dir.join(CONFIG_FILENAME))
}

fn default_snapshot_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.data_dir().join(SNAPSHOT_FILENAME))
}

fn normalize_string(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn expand_pathbuf(path: PathBuf) -> PathBuf {
    match path.to_str() {
        Some(s) => expand_home_path(s),
        None => path,
    }
}

fn resolve_path_from_config(value: String, base: Option<&Path>) -> Option<PathBuf> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    let expanded = expand_home_path(trimmed);
    match base {
        Some(base) if !expanded.is_absolute() => Some(base.join(expanded)),
        _ => Some(expanded),
    }
}

fn expand_home_path(value: &str) -> PathBuf {
    if value == "~" {
        if let Some(base) = BaseDirs::new() {
            return base.home_dir().to_path_buf();
        }
    } else if let Some(stripped) = value.strip_prefix("~/") {
        if let Some(base) = BaseDirs::new() {
            return base.home_dir().join(stripped);
        }
    }
    PathBuf::from(value)
}
