//! Runtime configuration
//!
//! Layered, lowest precedence first: built-in defaults, an optional JSON file,
//! then `EMOFLUX_*` environment variables. Command-line flags are applied on
//! top by the binary.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::FluxError;
use crate::store::DEFAULT_CAPACITY;
use crate::suggestion::DEFAULT_SUGGESTION_TIMEOUT;

pub const ENV_STORAGE_DIR: &str = "EMOFLUX_STORAGE_DIR";
pub const ENV_CAPACITY: &str = "EMOFLUX_CAPACITY";
pub const ENV_SUGGESTION_URL: &str = "EMOFLUX_SUGGESTION_URL";
pub const ENV_SUGGESTION_TIMEOUT_SECS: &str = "EMOFLUX_SUGGESTION_TIMEOUT_SECS";

/// Pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FluxConfig {
    /// Directory holding the persisted event log
    pub storage_dir: PathBuf,
    /// Maximum number of observations kept
    pub capacity: usize,
    /// Base URL of the suggestion service; `None` disables fetching
    pub suggestion_url: Option<String>,
    /// Suggestion request timeout in seconds
    pub suggestion_timeout_secs: u64,
}

impl Default for FluxConfig {
    fn default() -> Self {
        Self {
            storage_dir: default_storage_dir(),
            capacity: DEFAULT_CAPACITY,
            suggestion_url: None,
            suggestion_timeout_secs: DEFAULT_SUGGESTION_TIMEOUT.as_secs(),
        }
    }
}

/// Platform local data directory, or `./.emoflux` when there is none
fn default_storage_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("emoflux"))
        .unwrap_or_else(|| PathBuf::from(".emoflux"))
}

impl FluxConfig {
    /// Load defaults, then `path` (if given), then the process environment
    pub fn load(path: Option<&Path>) -> Result<Self, FluxError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Parse a JSON config file; missing fields take their defaults
    pub fn from_file(path: &Path) -> Result<Self, FluxError> {
        let contents = fs::read_to_string(path).map_err(|e| {
            FluxError::ConfigError(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&contents)
    }

    pub fn from_json(json: &str) -> Result<Self, FluxError> {
        let mut config: Self =
            serde_json::from_str(json).map_err(|e| FluxError::ConfigError(e.to_string()))?;
        config.capacity = config.capacity.max(1);
        Ok(config)
    }

    /// Override fields from environment variables read through `lookup`
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), FluxError> {
        if let Some(dir) = lookup(ENV_STORAGE_DIR) {
            self.storage_dir = PathBuf::from(dir);
        }

        if let Some(raw) = lookup(ENV_CAPACITY) {
            let capacity: usize = parse_env(ENV_CAPACITY, &raw)?;
            self.capacity = capacity.max(1);
        }

        if let Some(url) = lookup(ENV_SUGGESTION_URL) {
            let url = url.trim();
            self.suggestion_url = (!url.is_empty()).then(|| url.to_string());
        }

        if let Some(raw) = lookup(ENV_SUGGESTION_TIMEOUT_SECS) {
            self.suggestion_timeout_secs = parse_env(ENV_SUGGESTION_TIMEOUT_SECS, &raw)?;
        }

        Ok(())
    }

    pub fn suggestion_timeout(&self) -> Duration {
        Duration::from_secs(self.suggestion_timeout_secs)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, FluxError> {
    raw.trim()
        .parse()
        .map_err(|_| FluxError::ConfigError(format!("{key} has invalid value '{raw}'")))
}
