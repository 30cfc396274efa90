//! Configuration loading and validation.

use crate::error::{ConfigError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Bridgeflow configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Geometry used by the layout engine.
    pub layout: LayoutConfig,

    /// Limits for connected-agent expansion.
    pub expansion: ExpansionConfig,

    /// Persistence API settings.
    pub sync: SyncConfig,
}

/// Layout geometry.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Horizontal distance between BFS levels.
    pub h_spacing: f64,

    /// Vertical distance between siblings on one level.
    pub v_spacing: f64,

    /// X coordinate of level zero.
    pub base_x: f64,

    /// Baseline every level is centered on.
    pub base_y: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            h_spacing: 350.0,
            v_spacing: 150.0,
            base_x: 50.0,
            base_y: 250.0,
        }
    }
}

/// Connected-agent expansion limits.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct ExpansionConfig {
    /// Maximum levels of nested connected agents unrolled below an added agent.
    pub max_depth: usize,
}

impl Default for ExpansionConfig {
    fn default() -> Self {
        Self { max_depth: 4 }
    }
}

/// Persistence API settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Base URL of the agent API. Sync is disabled when unset.
    pub base_url: Option<String>,

    /// API key sent with every request.
    pub api_key: Option<String>,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            timeout_secs: 30,
        }
    }
}

impl Config {
    /// Load configuration from `$BRIDGEFLOW_CONFIG` or the user config directory,
    /// falling back to defaults when no file exists.
    pub fn load() -> Result<Self> {
        let path = std::env::var_os("BRIDGEFLOW_CONFIG")
            .map(PathBuf::from)
            .or_else(|| dirs::config_dir().map(|dir| dir.join("bridgeflow").join("config.toml")));

        let config = match path {
            Some(path) if path.exists() => Self::from_file(&path)?,
            _ => {
                tracing::debug!("no config file found, using defaults");
                Self::default()
            }
        };

        config.with_env_overrides().validated()
    }

    /// Load from a specific config file path.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        Self::from_file(path)?.with_env_overrides().validated()
    }

    /// Parse a TOML document.
    pub fn from_toml(source: &str, origin: &str) -> Result<Self> {
        toml::from_str(source).map_err(|error| {
            ConfigError::Parse {
                path: origin.to_string(),
                message: error.to_string(),
            }
            .into()
        })
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|error| ConfigError::Load {
            path: path.display().to_string(),
            source: Arc::new(error),
        })?;
        tracing::debug!(path = %path.display(), "loaded config file");
        Self::from_toml(&content, &path.display().to_string())
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("BRIDGEFLOW_API_URL") {
            self.sync.base_url = Some(url);
        }
        if let Ok(key) = std::env::var("BRIDGEFLOW_API_KEY") {
            self.sync.api_key = Some(key);
        }
        self
    }

    /// Reject geometry and limits the engine cannot work with.
    pub fn validated(self) -> Result<Self> {
        if self.layout.h_spacing <= 0.0 || self.layout.v_spacing <= 0.0 {
            return Err(ConfigError::Invalid("layout spacing must be positive".into()).into());
        }
        if self.expansion.max_depth == 0 {
            return Err(
                ConfigError::Invalid("expansion.max_depth must be at least 1".into()).into(),
            );
        }
        if self.sync.timeout_secs == 0 {
            return Err(ConfigError::Invalid("sync.timeout_secs must be positive".into()).into());
        }
        Ok(self)
    }
}
