//! Sync engine configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::history::DuplicatePolicy;

/// Minimum poll interval in milliseconds.
pub const MIN_POLL_INTERVAL_MS: u64 = 100;
/// Maximum poll interval in milliseconds (1 hour).
pub const MAX_POLL_INTERVAL_MS: u64 = 3_600_000;
/// Maximum number of readings requested per poll.
pub const MAX_HISTORY_LIMIT: usize = 10_000;

/// What to do with an optimistic edit whose request failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Leave the local value in place until the next poll replaces it.
    #[default]
    Keep,
    /// Restore the last server-confirmed value of the edited field.
    Rollback,
}

/// Configuration for a [`SyncEngine`](crate::sync::SyncEngine).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Base URL of the device API (e.g. `http://192.168.1.20:5001/api`).
    pub base_url: String,
    /// Default interval between poll ticks, in milliseconds.
    pub poll_interval_ms: u64,
    /// Number of readings requested per poll (the history window).
    pub history_limit: usize,
    /// Per-request timeout, in milliseconds.
    pub request_timeout_ms: u64,
    /// Capacity of the subscriber broadcast channel.
    pub event_capacity: usize,
    /// How duplicate timestamps in a poll are resolved.
    pub duplicate_policy: DuplicatePolicy,
    /// How failed mutations affect local state.
    pub failure_policy: FailurePolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5001/api".to_string(),
            poll_interval_ms: 5_000,
            history_limit: 20,
            request_timeout_ms: 10_000,
            event_capacity: 64,
            duplicate_policy: DuplicatePolicy::default(),
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl SyncConfig {
    /// Create a configuration for the given base URL, other values default.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Poll interval as a [`Duration`].
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Request timeout as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Load and validate configuration from a file.
    pub fn load_validated<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Validate the configuration and return every problem found.
    ///
    /// ```
    /// use smartmon_core::SyncConfig;
    ///
    /// SyncConfig::default().validate().expect("default config should be valid");
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.base_url.is_empty() {
            errors.push(ValidationError::new("base_url", "base URL cannot be empty"));
        } else if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://")
        {
            errors.push(ValidationError::new(
                "base_url",
                format!(
                    "'{}' must start with http:// or https://",
                    self.base_url
                ),
            ));
        }

        if self.poll_interval_ms < MIN_POLL_INTERVAL_MS {
            errors.push(ValidationError::new(
                "poll_interval_ms",
                format!(
                    "poll interval {} is too short (minimum {} ms)",
                    self.poll_interval_ms, MIN_POLL_INTERVAL_MS
                ),
            ));
        } else if self.poll_interval_ms > MAX_POLL_INTERVAL_MS {
            errors.push(ValidationError::new(
                "poll_interval_ms",
                format!(
                    "poll interval {} is too long (maximum {} ms / 1 hour)",
                    self.poll_interval_ms, MAX_POLL_INTERVAL_MS
                ),
            ));
        }

        if self.history_limit == 0 {
            errors.push(ValidationError::new("history_limit", "must be at least 1"));
        } else if self.history_limit > MAX_HISTORY_LIMIT {
            errors.push(ValidationError::new(
                "history_limit",
                format!("{} exceeds maximum of {}", self.history_limit, MAX_HISTORY_LIMIT),
            ));
        }

        if self.request_timeout_ms == 0 {
            errors.push(ValidationError::new("request_timeout_ms", "must be > 0"));
        }

        if self.event_capacity == 0 {
            errors.push(ValidationError::new("event_capacity", "must be > 0"));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),
    #[error("Configuration validation failed:\n{}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),
}

/// A single validation error with context.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The offending key.
    pub field: String,
    /// Description of the validation failure.
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}
