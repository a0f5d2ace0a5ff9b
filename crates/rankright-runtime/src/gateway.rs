//! The single entry point for model calls.
//!
//! [`ModelGateway`] turns the three things the pipeline needs from a model
//! (a summary, a per-criterion JSON assessment, a connectivity check) into
//! provider requests, retries transient failures and classifies everything
//! else into [`GatewayError`].

use std::sync::Arc;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value as JsonValue;
use thiserror::Error;

use rankright_core::RawCriterionResult;

use crate::prompts::{
    evaluation_prompt, summary_prompt, CONNECTION_TEST_PROMPT, EVALUATION_SYSTEM_PROMPT,
    SUMMARY_SYSTEM_PROMPT,
};
use crate::providers::{
    ChatMessage, CompletionConfig, CompletionResponse, LlmProvider, ProviderError,
    ProviderRegistry, ResponseFormat,
};

pub const SUMMARY_TEMPERATURE: f32 = 0.3;
pub const SUMMARY_MAX_TOKENS: u32 = 1000;
pub const EVALUATION_TEMPERATURE: f32 = 0.2;
pub const EVALUATION_MAX_TOKENS: u32 = 1500;
pub const CONNECTION_TEST_MAX_TOKENS: u32 = 10;

/// Guidance shown when the backend refuses the caller's network.
pub const ACCESS_BLOCKED_REMEDIATION: &str = "\
Access denied due to network access rules on the model resource. To fix this:

1. Open the model resource in the cloud portal
2. Go to its 'Networking' settings
3. Under 'Firewalls and virtual networks':
   - Allow access from all networks, OR
   - Add your current IP address to the allowed list
4. Save and wait a few minutes for the change to propagate
5. Run the analysis again

If the resource must stay restricted, run this tool from inside the allowed virtual network.";

lazy_static! {
    static ref ACCESS_POLICY_WORDING: Regex =
        Regex::new(r"(?i)virtual network|firewall|network rules").unwrap();
    static ref CODE_FENCE: Regex = Regex::new(r"(?s)^```[a-zA-Z]*\s*(.*?)\s*```$").unwrap();
}

/// In-flight failures talking to the backend.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Access blocked by network policy (HTTP {status}): {message}")]
    AccessBlocked { status: u16, message: String },

    #[error(transparent)]
    Failed(#[from] ProviderError),
}

/// Errors from the model gateway.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Model backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Model request failed: {0}")]
    Transport(#[from] TransportError),

    #[error("Malformed model response: {0}")]
    MalformedResponse(String),
}

impl GatewayError {
    /// Actionable guidance for errors the user can fix themselves.
    pub fn remediation(&self) -> Option<&'static str> {
        match self {
            GatewayError::Transport(TransportError::AccessBlocked { .. }) => {
                Some(ACCESS_BLOCKED_REMEDIATION)
            }
            _ => None,
        }
    }

    pub fn is_access_blocked(&self) -> bool {
        matches!(
            self,
            GatewayError::Transport(TransportError::AccessBlocked { .. })
        )
    }
}

impl From<ProviderError> for GatewayError {
    fn from(error: ProviderError) -> Self {
        match error {
            ProviderError::NotConfigured(reason) => GatewayError::BackendUnavailable(reason),
            ProviderError::ApiError { status: 403, message }
                if ACCESS_POLICY_WORDING.is_match(&message) =>
            {
                TransportError::AccessBlocked {
                    status: 403,
                    message,
                }
                .into()
            }
            other => TransportError::Failed(other).into(),
        }
    }
}

/// Request policy applied to every model call.
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    /// Upper bound for one attempt
    pub request_timeout: Duration,

    /// Extra attempts after a transient failure
    pub max_retries: usize,

    /// First backoff delay; doubles per retry
    pub retry_delay: Duration,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(60),
            max_retries: 2,
            retry_delay: Duration::from_secs(1),
        }
    }
}

/// Either a constructed provider or the reason one could not be built.
pub enum Backend {
    Ready(Arc<dyn LlmProvider>),
    Unavailable(String),
}

/// Model access for the evaluation pipeline.
pub struct ModelGateway {
    backend: Backend,
    settings: GatewaySettings,
}

impl std::fmt::Debug for ModelGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let backend = match &self.backend {
            Backend::Ready(provider) => provider.name().to_string(),
            Backend::Unavailable(reason) => format!("unavailable: {reason}"),
        };
        f.debug_struct("ModelGateway")
            .field("backend", &backend)
            .field("settings", &self.settings)
            .finish()
    }
}

impl ModelGateway {
    pub fn new(provider: Arc<dyn LlmProvider>, settings: GatewaySettings) -> Self {
        Self {
            backend: Backend::Ready(provider),
            settings,
        }
    }

    /// A gateway whose every call fails with `BackendUnavailable(reason)`.
    pub fn unavailable(reason: impl Into<String>, settings: GatewaySettings) -> Self {
        Self {
            backend: Backend::Unavailable(reason.into()),
            settings,
        }
    }

    /// Build the backend from the registry. Construction failures (missing
    /// credentials or endpoint) leave the gateway unavailable rather than
    /// failing startup.
    pub fn from_registry(
        registry: &ProviderRegistry,
        provider_type: &str,
        config: &JsonValue,
        settings: GatewaySettings,
    ) -> Self {
        match registry.create(provider_type, config) {
            Ok(provider) => {
                tracing::info!(provider = provider.name(), "Model backend ready");
                Self::new(provider, settings)
            }
            Err(e) => {
                tracing::warn!(provider = provider_type, error = %e, "Model backend unavailable");
                Self::unavailable(e.to_string(), settings)
            }
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self.backend, Backend::Ready(_))
    }

    pub fn backend_name(&self) -> Option<&str> {
        match &self.backend {
            Backend::Ready(provider) => Some(provider.name()),
            Backend::Unavailable(_) => None,
        }
    }

    pub fn settings(&self) -> &GatewaySettings {
        &self.settings
    }

    /// Summarize `text` in roughly `target_length` words.
    ///
    /// Returns the trimmed response; an empty response is returned as-is.
    pub async fn summarize(&self, text: &str, target_length: usize) -> Result<String, GatewayError> {
        let provider = self.provider()?;

        let messages = vec![
            ChatMessage::system(SUMMARY_SYSTEM_PROMPT),
            ChatMessage::user(summary_prompt(text, target_length)),
        ];
        let config = CompletionConfig {
            max_tokens: SUMMARY_MAX_TOKENS,
            temperature: Some(SUMMARY_TEMPERATURE),
            timeout: self.settings.request_timeout,
            response_format: ResponseFormat::Text,
            ..Default::default()
        };

        let response = self.complete(provider, messages, config).await?;
        Ok(response.content.trim().to_string())
    }

    /// Ask the model to assess `text` against one criterion.
    ///
    /// The payload must be a JSON object; it is returned unvalidated.
    pub async fn evaluate(
        &self,
        text: &str,
        criterion_name: &str,
        criterion_description: &str,
    ) -> Result<RawCriterionResult, GatewayError> {
        let provider = self.provider()?;

        let messages = vec![
            ChatMessage::system(EVALUATION_SYSTEM_PROMPT),
            ChatMessage::user(evaluation_prompt(criterion_name, criterion_description, text)),
        ];
        let config = CompletionConfig {
            max_tokens: EVALUATION_MAX_TOKENS,
            temperature: Some(EVALUATION_TEMPERATURE),
            timeout: self.settings.request_timeout,
            response_format: ResponseFormat::JsonObject,
            ..Default::default()
        };

        let response = self.complete(provider, messages, config).await?;
        parse_criterion_payload(&response.content)
    }

    /// Minimal round trip. Never errors; failures come back as `(false, reason)`.
    pub async fn test_connection(&self) -> (bool, String) {
        let provider = match &self.backend {
            Backend::Ready(provider) => provider,
            Backend::Unavailable(reason) => return (false, reason.clone()),
        };

        let config = CompletionConfig {
            max_tokens: CONNECTION_TEST_MAX_TOKENS,
            timeout: self.settings.request_timeout,
            ..Default::default()
        };

        match attempt(provider, vec![ChatMessage::user(CONNECTION_TEST_PROMPT)], &config).await {
            Ok(_) => (true, "Connection successful".to_string()),
            Err(e) => {
                let error = GatewayError::from(e);
                tracing::warn!(provider = provider.name(), error = %error, "Connection test failed");
                let message = match error.remediation() {
                    Some(remediation) => format!("{error}\n\n{remediation}"),
                    None => error.to_string(),
                };
                (false, message)
            }
        }
    }

    fn provider(&self) -> Result<&Arc<dyn LlmProvider>, GatewayError> {
        match &self.backend {
            Backend::Ready(provider) => Ok(provider),
            Backend::Unavailable(reason) => Err(GatewayError::BackendUnavailable(reason.clone())),
        }
    }

    async fn complete(
        &self,
        provider: &Arc<dyn LlmProvider>,
        messages: Vec<ChatMessage>,
        config: CompletionConfig,
    ) -> Result<CompletionResponse, GatewayError> {
        let backoff = ExponentialBuilder::default()
            .with_min_delay(self.settings.retry_delay)
            .with_max_times(self.settings.max_retries);

        let messages = &messages;
        let config = &config;

        let response = (|| async move { attempt(provider, messages.clone(), config).await })
            .retry(backoff)
            .when(ProviderError::is_transient)
            .adjust(|err: &ProviderError, delay: Option<Duration>| match err {
                // A server-supplied delay wins, but only while retries remain.
                ProviderError::RateLimited {
                    retry_after: Some(retry_after),
                } => delay.map(|_| *retry_after),
                _ => delay,
            })
            .notify(|err: &ProviderError, delay: Duration| {
                tracing::warn!(
                    provider = provider.name(),
                    error = %err,
                    delay = ?delay,
                    "Retrying model request"
                );
            })
            .await?;

        tracing::debug!(
            provider = provider.name(),
            model = %response.model,
            tokens = response.usage.total(),
            "Model request completed"
        );

        Ok(response)
    }
}

/// One request bounded by the configured timeout.
async fn attempt(
    provider: &Arc<dyn LlmProvider>,
    messages: Vec<ChatMessage>,
    config: &CompletionConfig,
) -> Result<CompletionResponse, ProviderError> {
    match tokio::time::timeout(config.timeout, provider.complete(messages, config)).await {
        Ok(result) => result,
        Err(_) => Err(ProviderError::Timeout(config.timeout)),
    }
}

/// Parse a model payload into a raw criterion result.
///
/// Tolerates surrounding whitespace and a Markdown code fence; anything that
/// is not a single JSON object is `MalformedResponse`.
pub fn parse_criterion_payload(content: &str) -> Result<RawCriterionResult, GatewayError> {
    let trimmed = content.trim();
    let body = CODE_FENCE
        .captures(trimmed)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(trimmed);

    if body.is_empty() {
        return Err(GatewayError::MalformedResponse(
            "No response content received".to_string(),
        ));
    }

    let value: JsonValue = serde_json::from_str(body).map_err(|e| {
        GatewayError::MalformedResponse(format!("Failed to parse evaluation response as JSON: {e}"))
    })?;

    RawCriterionResult::try_from(value).map_err(|e| GatewayError::MalformedResponse(e.to_string()))
}
