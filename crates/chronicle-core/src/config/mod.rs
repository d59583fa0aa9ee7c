//! Configuration system for chronicle.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::diff::DiffFormat;
use crate::error::{ChronicleError, ChronicleResult};

/// Versioning policy knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VersioningConfig {
    /// Skip the snapshot when a save of a persisted record changes no tracked
    /// field. Off by default: every save of a persisted record is recorded.
    pub skip_unchanged_saves: bool,
    /// Stamp the update timestamp on save when the caller did not set it.
    pub touch_updated_at: bool,
    /// Output format used by `diff` when the caller passes none.
    pub default_diff_format: DiffFormat,
}

impl Default for VersioningConfig {
    fn default() -> Self {
        Self {
            skip_unchanged_saves: false,
            touch_updated_at: true,
            default_diff_format: DiffFormat::Html,
        }
    }
}

/// Main chronicle configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChronicleConfig {
    /// Path to the SQLite database holding records and versions.
    pub database_path: PathBuf,
    /// How long a writer waits on a locked database before failing.
    pub busy_timeout_ms: u64,
    /// Versioning policy.
    pub versioning: VersioningConfig,
}

impl Default for ChronicleConfig {
    fn default() -> Self {
        let chronicle_dir = dirs::home_dir()
            .map(|h| h.join(".chronicle"))
            .unwrap_or_else(|| PathBuf::from(".chronicle"));

        Self {
            database_path: chronicle_dir.join("chronicle.db"),
            busy_timeout_ms: 5_000,
            versioning: VersioningConfig::default(),
        }
    }
}

impl ChronicleConfig {
    /// Load configuration from a file (TOML, JSON, or YAML).
    pub fn from_file(path: impl AsRef<std::path::Path>) -> ChronicleResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let ext = path.as_ref().extension().and_then(|e| e.to_str());

        match ext {
            Some("toml") => {
                toml::from_str(&content).map_err(|e| ChronicleError::Configuration(e.to_string()))
            }
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| ChronicleError::Configuration(e.to_string())),
            Some("yaml" | "yml") => serde_yaml::from_str(&content)
                .map_err(|e| ChronicleError::Configuration(e.to_string())),
            _ => Err(ChronicleError::Configuration(
                "Unsupported config file format. Use .toml, .json, or .yaml".to_string(),
            )),
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("CHRONICLE_DB_PATH") {
            config.database_path = PathBuf::from(path);
        }
        if let Some(ms) = std::env::var("CHRONICLE_BUSY_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            config.busy_timeout_ms = ms;
        }
        if let Ok(flag) = std::env::var("CHRONICLE_SKIP_UNCHANGED_SAVES") {
            config.versioning.skip_unchanged_saves =
                matches!(flag.to_lowercase().as_str(), "1" | "true" | "yes");
        }

        config
    }

    /// Build configuration using builder pattern.
    pub fn builder() -> ChronicleConfigBuilder {
        ChronicleConfigBuilder::default()
    }
}

/// Builder for ChronicleConfig.
#[derive(Default)]
pub struct ChronicleConfigBuilder {
    config: ChronicleConfig,
}

impl ChronicleConfigBuilder {
    /// Set database path.
    pub fn database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.database_path = path.into();
        self
    }

    /// Set busy timeout in milliseconds.
    pub fn busy_timeout_ms(mut self, ms: u64) -> Self {
        self.config.busy_timeout_ms = ms;
        self
    }

    /// Skip snapshots for saves that change no tracked field.
    pub fn skip_unchanged_saves(mut self, skip: bool) -> Self {
        self.config.versioning.skip_unchanged_saves = skip;
        self
    }

    /// Stamp the update timestamp on save.
    pub fn touch_updated_at(mut self, touch: bool) -> Self {
        self.config.versioning.touch_updated_at = touch;
        self
    }

    /// Set the default diff output format.
    pub fn default_diff_format(mut self, format: DiffFormat) -> Self {
        self.config.versioning.default_diff_format = format;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> ChronicleConfig {
        self.config
    }
}
