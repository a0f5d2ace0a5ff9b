//! Credential handling for model providers.
//!
//! Keys are wrapped in [`ApiCredential`] as soon as they are read, so they
//! cannot show up in `Debug`/`Display` output, logs or error messages.
//!
//! ## Usage
//!
//! ```ignore
//! use crate::providers::secrets::ApiCredential;
//!
//! // Load from config with env fallback
//! let cred = ApiCredential::from_config_or_env(
//!     &config,
//!     "api_key",
//!     "AZURE_OPENAI_API_KEY",
//!     "Azure OpenAI API key",
//! )?;
//!
//! // Use in HTTP header (explicit exposure)
//! request.header("api-key", cred.expose());
//! ```

use secrecy::{ExposeSecret, SecretString};
use serde_json::Value as JsonValue;
use std::fmt;

use super::ProviderError;

/// Where a credential was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// Loaded from the configuration file
    Config,
    /// Loaded from an environment variable
    Environment,
    /// Provided programmatically
    Programmatic,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::Config => write!(f, "config"),
            CredentialSource::Environment => write!(f, "environment"),
            CredentialSource::Programmatic => write!(f, "programmatic"),
        }
    }
}

/// A securely-stored API credential.
///
/// `Debug` and `Display` print `[REDACTED]`; the value is zeroed on drop by
/// `secrecy` and only reachable through [`ApiCredential::expose`].
pub struct ApiCredential {
    value: SecretString,
    source: CredentialSource,
    name: &'static str,
}

impl ApiCredential {
    pub fn new(value: impl Into<String>, source: CredentialSource, name: &'static str) -> Self {
        Self {
            value: SecretString::from(value.into()),
            source,
            name,
        }
    }

    /// Load credential from JSON config, falling back to an environment variable.
    ///
    /// Blank values count as missing in both places: configuration files
    /// written with empty placeholders must not shadow the environment.
    pub fn from_config_or_env(
        config: &JsonValue,
        config_key: &str,
        env_var: &str,
        name: &'static str,
    ) -> Result<Self, ProviderError> {
        if let Some(value) = non_blank(config[config_key].as_str()) {
            return Ok(Self::new(value, CredentialSource::Config, name));
        }

        if let Some(value) = non_blank(std::env::var(env_var).ok().as_deref()) {
            return Ok(Self::new(value, CredentialSource::Environment, name));
        }

        Err(ProviderError::NotConfigured(format!(
            "{} required: set '{}' in config or {} environment variable",
            name, config_key, env_var
        )))
    }

    /// Check if a credential is available without loading it.
    pub fn is_available(config: &JsonValue, config_key: &str, env_var: &str) -> bool {
        non_blank(config[config_key].as_str()).is_some()
            || non_blank(std::env::var(env_var).ok().as_deref()).is_some()
    }

    /// Expose the credential value for use in API calls.
    ///
    /// Call this only where the value is sent (e.g. an HTTP header) and never
    /// store the result.
    pub fn expose(&self) -> &str {
        self.value.expose_secret()
    }

    pub fn source(&self) -> CredentialSource {
        self.source
    }
}

impl fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredential")
            .field("value", &"[REDACTED]")
            .field("source", &self.source)
            .field("name", &self.name)
            .finish()
    }
}

impl fmt::Display for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} from {} [REDACTED]", self.name, self.source)
    }
}

/// Read a plain (non-secret) setting from config with an environment fallback.
pub fn setting_from_config_or_env(
    config: &JsonValue,
    config_key: &str,
    env_var: &str,
) -> Option<String> {
    non_blank(config[config_key].as_str())
        .map(str::to_string)
        .or_else(|| non_blank(std::env::var(env_var).ok().as_deref()).map(str::to_string))
}

/// Read a boolean setting from config (bool or "true"/"false") or the environment.
pub fn flag_from_config_or_env(config: &JsonValue, config_key: &str, env_var: &str) -> bool {
    match &config[config_key] {
        JsonValue::Bool(b) => *b,
        JsonValue::String(s) => s.trim().eq_ignore_ascii_case("true"),
        _ => std::env::var(env_var)
            .map(|v| v.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false),
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
