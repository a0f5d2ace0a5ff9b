//! Model provider abstractions for rankright-runtime.
//!
//! This module defines the trait every model backend implements, plus the
//! Azure OpenAI implementation behind the `azure-openai` feature.
//!
//! ## Security
//!
//! All providers use the [`secrets`] module for credential handling.
//! See [`ApiCredential`] for the recommended patterns.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

mod factory;
pub mod secrets;

#[cfg(feature = "azure-openai")]
mod azure_openai;

pub use factory::{ProviderFactory, ProviderRegistry};
pub use secrets::{ApiCredential, CredentialSource};

#[cfg(feature = "azure-openai")]
pub use azure_openai::{
    effective_endpoint, AzureOpenAiProvider, AzureOpenAiProviderFactory, PrivateEndpoint,
};

/// Errors from model providers.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    #[error("Rate limit exceeded, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    ParseError(String),

    #[error("Authentication failed: {0}")]
    AuthError(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

impl ProviderError {
    /// Whether a retry of the same request may succeed.
    ///
    /// Rate limiting, server-side failures, timeouts and connection errors
    /// are transient. Client errors and configuration problems are not.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::RateLimited { .. }
            | ProviderError::Timeout(_)
            | ProviderError::HttpError(_) => true,
            ProviderError::ApiError { status, .. } => *status >= 500,
            ProviderError::ParseError(_)
            | ProviderError::AuthError(_)
            | ProviderError::NotConfigured(_) => false,
        }
    }
}

/// Shape the model is asked to answer in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResponseFormat {
    #[default]
    Text,

    /// A single JSON object
    JsonObject,
}

/// Configuration for a completion request.
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    /// Model override; `None` uses the provider's configured model
    pub model: Option<String>,

    /// Maximum tokens to generate
    pub max_tokens: u32,

    /// Sampling temperature; `None` leaves the backend default
    pub temperature: Option<f32>,

    /// Request timeout
    pub timeout: Duration,

    pub response_format: ResponseFormat,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            model: None,
            max_tokens: 1000,
            temperature: None,
            timeout: Duration::from_secs(60),
            response_format: ResponseFormat::Text,
        }
    }
}

/// A chat message for completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role: "system" or "user"
    pub role: String,

    /// Message content
    pub content: String,
}

impl ChatMessage {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Response from a completion.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// Generated content
    pub content: String,

    /// Token usage
    pub usage: TokenUsage,

    /// Model (or deployment) that answered
    pub model: String,

    /// Stop reason
    pub stop_reason: Option<String>,
}

/// Token usage from a completion.
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    /// Tokens in the prompt
    pub prompt_tokens: u32,

    /// Tokens in the completion
    pub completion_tokens: u32,
}

impl TokenUsage {
    /// Total tokens used.
    pub fn total(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// Provider abstraction allows swapping model backends.
///
/// Only the [`ModelGateway`](crate::gateway::ModelGateway) calls providers.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Execute a chat completion.
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError>;

    /// Provider name for logs.
    fn name(&self) -> &str;
}
