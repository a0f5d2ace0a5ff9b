//! Runtime configuration.
//!
//! Loaded from a JSON or YAML file (chosen by extension). A missing file
//! yields the defaults; credentials the file leaves out are filled from the
//! environment by the provider factories.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::gateway::GatewaySettings;

pub const DEFAULT_PROVIDER: &str = "azure-openai";
pub const DEFAULT_DATABASE_PATH: &str = "rankright.db";
pub const DEFAULT_SUMMARY_LENGTH: usize = 500;

/// Errors loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Everything needed to build an [`AppContext`](crate::AppContext).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Provider type registered in the provider registry
    pub provider: String,

    /// Provider-specific settings handed to the factory
    #[serde(alias = "azure_openai")]
    pub provider_config: JsonValue,

    /// Upper bound for one model request, e.g. "60s" or "2m"
    #[serde(with = "humantime_duration")]
    pub request_timeout: Duration,

    /// Extra attempts after a transient model failure
    pub max_retries: usize,

    /// First retry delay; later retries back off exponentially
    #[serde(with = "humantime_duration")]
    pub retry_delay: Duration,

    /// Criteria evaluated at the same time
    pub max_concurrency: usize,

    /// Target summary length in words
    pub summary_length: usize,

    pub database_path: PathBuf,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            provider: DEFAULT_PROVIDER.to_string(),
            provider_config: JsonValue::Object(Default::default()),
            request_timeout: Duration::from_secs(60),
            max_retries: 2,
            retry_delay: Duration::from_secs(1),
            max_concurrency: 1,
            summary_length: DEFAULT_SUMMARY_LENGTH,
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
        }
    }
}

impl RuntimeConfig {
    /// Load from `path`, or the defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let config = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml(&text)?,
            _ => Self::from_json(&text)?,
        };

        tracing::debug!(path = %path.display(), provider = %config.provider, "Loaded config");
        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.provider.trim().is_empty() {
            return Err(ConfigError::Invalid("provider must not be empty".to_string()));
        }
        if !self.provider_config.is_object() {
            return Err(ConfigError::Invalid(
                "provider_config must be an object".to_string(),
            ));
        }
        if self.max_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "max_concurrency must be at least 1".to_string(),
            ));
        }
        if self.summary_length == 0 {
            return Err(ConfigError::Invalid(
                "summary_length must be at least 1".to_string(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "request_timeout must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn gateway_settings(&self) -> GatewaySettings {
        GatewaySettings {
            request_timeout: self.request_timeout,
            max_retries: self.max_retries,
            retry_delay: self.retry_delay,
        }
    }
}

/// Serde adapter for durations written as "60s", "1m 30s", ...
mod humantime_duration {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(&text).map_err(serde::de::Error::custom)
    }
}
