//! Migration configuration loading
//!
//! Loads `~/.config/ld-migrate/config.toml` (or the file named by
//! `LD_MIGRATE_CONFIG`, or an explicit path). Every key is optional; command
//! line flags are applied on top by the caller.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Environment variable naming an alternate config file.
pub const CONFIG_ENV_VAR: &str = "LD_MIGRATE_CONFIG";

/// Host used when none is configured.
pub const DEFAULT_DOMAIN: &str = "app.launchdarkly.com";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MigrateConfig {
    /// API access token sent verbatim in the `Authorization` header.
    pub api_key: Option<String>,

    /// Bare host, or a full base URL such as `http://127.0.0.1:8080`.
    pub domain: String,

    /// Root of the captured snapshot tree.
    pub snapshot_dir: PathBuf,

    pub request_timeout_secs: u64,
}

impl Default for MigrateConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            domain: DEFAULT_DOMAIN.to_string(),
            snapshot_dir: PathBuf::from("./source"),
            request_timeout_secs: 30,
        }
    }
}

impl MigrateConfig {
    /// Load from `explicit`, else `LD_MIGRATE_CONFIG`, else the default path.
    ///
    /// Only a missing default file falls back to defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load_from(path);
        }
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR)
            && !path.is_empty()
        {
            return Self::load_from(Path::new(&path));
        }
        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".config").join("ld-migrate").join("config.toml"))
    }

    /// Root of the v2 API for the configured domain.
    pub fn api_base_url(&self) -> String {
        let domain = self.domain.trim().trim_end_matches('/');
        let origin = if domain.starts_with("http://") || domain.starts_with("https://") {
            domain.to_string()
        } else {
            format!("https://{domain}")
        };
        format!("{origin}/api/v2")
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or(ConfigError::MissingApiKey)
    }
}
