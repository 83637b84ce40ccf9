use std::env;
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::error::{StoreError, StoreResult};

pub const DEFAULT_COLLECTION: &str = "video_frames";
pub const DEFAULT_SCORE_THRESHOLD: f32 = 0.1;
pub const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection settings of the remote similarity index.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteConfig {
    pub url: Url,
    pub api_key: Option<String>,
    pub collection: String,
    pub timeout: Duration,
    pub score_threshold: f32,
}

impl RemoteConfig {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            api_key: None,
            collection: DEFAULT_COLLECTION.to_string(),
            timeout: DEFAULT_REMOTE_TIMEOUT,
            score_threshold: DEFAULT_SCORE_THRESHOLD,
        }
    }

    pub fn parse(url: &str) -> StoreResult<Self> {
        let parsed = Url::parse(url.trim()).map_err(|err| {
            StoreError::configuration(format!("invalid remote index url '{url}': {err}"))
        })?;
        Ok(Self::new(parsed))
    }
}

/// Which backends the store uses. Without `remote` the store runs local-only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreConfig {
    pub remote: Option<RemoteConfig>,
    pub snapshot_path: Option<PathBuf>,
}

impl StoreConfig {
    pub fn from_env() -> StoreResult<Self> {
        let mut config = StoreConfig::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Overrides fields from `QDRANT_*` and `FRAMESCOPE_*` environment
    /// variables. An empty `QDRANT_URL` disables the remote backend.
    pub fn apply_env(&mut self) -> StoreResult<()> {
        if let Ok(url) = env::var("QDRANT_URL") {
            self.remote = if url.trim().is_empty() {
                None
            } else {
                let previous = self.remote.take();
                let mut remote = RemoteConfig::parse(&url)?;
                if let Some(previous) = previous {
                    remote.api_key = previous.api_key;
                    remote.collection = previous.collection;
                    remote.timeout = previous.timeout;
                    remote.score_threshold = previous.score_threshold;
                }
                Some(remote)
            };
        }
        if let Some(remote) = self.remote.as_mut() {
            if let Ok(key) = env::var("QDRANT_API_KEY") {
                remote.api_key = (!key.trim().is_empty()).then(|| key.trim().to_string());
            }
            if let Ok(collection) = env::var("FRAMESCOPE_COLLECTION") {
                remote.collection = validate_collection(&collection)?;
            }
            if let Ok(value) = env::var("FRAMESCOPE_REMOTE_TIMEOUT_SECS") {
                let secs: u64 = value.trim().parse().map_err(|_| {
                    StoreError::configuration(format!(
                        "failed to parse FRAMESCOPE_REMOTE_TIMEOUT_SECS='{value}' as whole seconds"
                    ))
                })?;
                if secs == 0 {
                    return Err(StoreError::configuration(
                        "FRAMESCOPE_REMOTE_TIMEOUT_SECS must be greater than zero",
                    ));
                }
                remote.timeout = Duration::from_secs(secs);
            }
        }
        if let Ok(path) = env::var("FRAMESCOPE_SNAPSHOT") {
            self.snapshot_path = (!path.trim().is_empty()).then(|| PathBuf::from(path));
        }
        Ok(())
    }
}

pub fn validate_collection(name: &str) -> StoreResult<String> {
    let name = name.trim();
    if name.is_empty()
        || !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(StoreError::configuration(format!(
            "invalid collection name '{name}'"
        )));
    }
    Ok(name.to_string())
}
