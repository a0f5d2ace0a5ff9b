//! Azure OpenAI chat-completions provider.
//!
//! Requests go to a named deployment:
//! `{endpoint}/openai/deployments/{deployment}/chat/completions?api-version=..`
//! authenticated with the `api-key` header. When private networking is
//! enabled the endpoint host is replaced by the private FQDN (preferred) or
//! the private IP.

use super::{
    factory::ProviderFactory,
    secrets::{flag_from_config_or_env, setting_from_config_or_env, ApiCredential},
    ChatMessage, CompletionConfig, CompletionResponse, LlmProvider, ProviderError,
    ResponseFormat, TokenUsage,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;

pub const AZURE_OPENAI_ENDPOINT_ENV: &str = "AZURE_OPENAI_ENDPOINT";
pub const AZURE_OPENAI_API_KEY_ENV: &str = "AZURE_OPENAI_API_KEY";
pub const AZURE_OPENAI_API_VERSION_ENV: &str = "AZURE_OPENAI_API_VERSION";
pub const AZURE_OPENAI_DEPLOYMENT_ENV: &str = "AZURE_OPENAI_DEPLOYMENT_NAME";
pub const AZURE_OPENAI_USE_PRIVATE_ENV: &str = "AZURE_OPENAI_USE_PRIVATE_ENDPOINT";
pub const AZURE_OPENAI_PRIVATE_IP_ENV: &str = "AZURE_OPENAI_PRIVATE_IP";
pub const AZURE_OPENAI_PRIVATE_FQDN_ENV: &str = "AZURE_OPENAI_PRIVATE_FQDN";

pub const DEFAULT_API_VERSION: &str = "2024-02-01";
pub const DEFAULT_DEPLOYMENT: &str = "gpt-4o";

/// Private-network address of the Azure OpenAI resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivateEndpoint {
    pub ip: String,
    pub fqdn: Option<String>,
}

/// The endpoint to connect to, with the host swapped for the private
/// address when one is configured. Scheme and path are kept.
pub fn effective_endpoint(endpoint: &str, private: Option<&PrivateEndpoint>) -> String {
    let Some(private) = private else {
        return endpoint.to_string();
    };

    let host = private.fqdn.as_deref().unwrap_or(&private.ip);
    let (scheme, rest) = endpoint.split_once("://").unwrap_or(("https", endpoint));
    let path = rest.find('/').map(|i| &rest[i..]).unwrap_or("");

    format!("{scheme}://{host}{path}")
}

/// Azure OpenAI provider.
pub struct AzureOpenAiProvider {
    credential: ApiCredential,
    endpoint: String,
    api_version: String,
    deployment_name: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for AzureOpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureOpenAiProvider")
            .field("credential", &self.credential)
            .field("endpoint", &self.endpoint)
            .field("api_version", &self.api_version)
            .field("deployment_name", &self.deployment_name)
            .finish()
    }
}

impl AzureOpenAiProvider {
    /// Create from JSON configuration with `AZURE_OPENAI_*` environment fallbacks.
    ///
    /// ## Configuration Format
    /// ```json
    /// {
    ///   "endpoint": "https://myresource.openai.azure.com/",
    ///   "api_key": "...",
    ///   "api_version": "2024-02-01",
    ///   "deployment_name": "gpt-4o",
    ///   "use_private_endpoint": false,
    ///   "private_endpoint_ip": "10.0.0.5",
    ///   "private_endpoint_fqdn": "myresource.privatelink.openai.azure.com"
    /// }
    /// ```
    pub fn from_config(config: &JsonValue) -> Result<Self, ProviderError> {
        let credential = ApiCredential::from_config_or_env(
            config,
            "api_key",
            AZURE_OPENAI_API_KEY_ENV,
            "Azure OpenAI API key",
        )?;

        let endpoint = setting_from_config_or_env(config, "endpoint", AZURE_OPENAI_ENDPOINT_ENV)
            .ok_or_else(|| {
                ProviderError::NotConfigured(format!(
                    "Azure OpenAI endpoint required: set 'endpoint' in config or {} environment variable",
                    AZURE_OPENAI_ENDPOINT_ENV
                ))
            })?;

        let api_version =
            setting_from_config_or_env(config, "api_version", AZURE_OPENAI_API_VERSION_ENV)
                .unwrap_or_else(|| DEFAULT_API_VERSION.to_string());
        let deployment_name =
            setting_from_config_or_env(config, "deployment_name", AZURE_OPENAI_DEPLOYMENT_ENV)
                .unwrap_or_else(|| DEFAULT_DEPLOYMENT.to_string());

        let private = private_endpoint_from_config(config);

        Ok(Self {
            credential,
            endpoint: effective_endpoint(&endpoint, private.as_ref()),
            api_version,
            deployment_name,
            client: build_client()?,
        })
    }

    /// Endpoint requests are sent to, after private-endpoint substitution.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn deployment_name(&self) -> &str {
        &self.deployment_name
    }

    fn completions_url(&self, deployment: &str) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint.trim_end_matches('/'),
            deployment,
            self.api_version
        )
    }
}

fn private_endpoint_from_config(config: &JsonValue) -> Option<PrivateEndpoint> {
    if !flag_from_config_or_env(config, "use_private_endpoint", AZURE_OPENAI_USE_PRIVATE_ENV) {
        return None;
    }

    match setting_from_config_or_env(config, "private_endpoint_ip", AZURE_OPENAI_PRIVATE_IP_ENV) {
        Some(ip) => Some(PrivateEndpoint {
            ip,
            fqdn: setting_from_config_or_env(
                config,
                "private_endpoint_fqdn",
                AZURE_OPENAI_PRIVATE_FQDN_ENV,
            ),
        }),
        None => {
            tracing::warn!("Private endpoint enabled without a private IP, using public endpoint");
            None
        }
    }
}

fn build_client() -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| ProviderError::HttpError(format!("failed to build HTTP client: {e}")))
}

/// Chat-completions request body.
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    messages: &'a [ChatMessage],
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormatBody>,
}

#[derive(Debug, Serialize)]
struct ResponseFormatBody {
    #[serde(rename = "type")]
    type_: &'static str,
}

impl<'a> ChatCompletionRequest<'a> {
    fn new(messages: &'a [ChatMessage], config: &CompletionConfig) -> Self {
        Self {
            messages,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            response_format: match config.response_format {
                ResponseFormat::Text => None,
                ResponseFormat::JsonObject => Some(ResponseFormatBody {
                    type_: "json_object",
                }),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct AzureError {
    error: AzureErrorDetail,
}

#[derive(Debug, Deserialize)]
struct AzureErrorDetail {
    message: String,
}

fn into_completion(
    body: ChatCompletionResponse,
    deployment: &str,
) -> Result<CompletionResponse, ProviderError> {
    let usage = body
        .usage
        .map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
        })
        .unwrap_or_default();

    let choice = body
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::ParseError("response contained no choices".to_string()))?;

    Ok(CompletionResponse {
        content: choice.message.content.unwrap_or_default(),
        usage,
        model: body.model.unwrap_or_else(|| deployment.to_string()),
        stop_reason: choice.finish_reason,
    })
}

/// Pull the service's message out of an error body, falling back to the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<AzureError>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.trim().to_string())
}

#[async_trait]
impl LlmProvider for AzureOpenAiProvider {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        let deployment = config.model.as_deref().unwrap_or(&self.deployment_name);
        let request = ChatCompletionRequest::new(&messages, config);

        // Only expose the credential here, at the point of use
        let response = self
            .client
            .post(self.completions_url(deployment))
            .header("api-key", self.credential.expose())
            .header("content-type", "application/json")
            .timeout(config.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(config.timeout)
                } else {
                    ProviderError::HttpError(e.to_string())
                }
            })?;

        let status = response.status();

        if status == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(ProviderError::RateLimited { retry_after });
        }

        if !status.is_success() {
            let body = response
                .text()
                .await
                .map_err(|e| ProviderError::HttpError(e.to_string()))?;
            let message = error_message(&body);

            if status == 401 {
                return Err(ProviderError::AuthError(message));
            }
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let body: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        into_completion(body, deployment)
    }

    fn name(&self) -> &str {
        "azure-openai"
    }
}

/// Factory for creating Azure OpenAI providers from configuration.
pub struct AzureOpenAiProviderFactory;

impl ProviderFactory for AzureOpenAiProviderFactory {
    fn provider_type(&self) -> &'static str {
        "azure-openai"
    }

    fn create(&self, config: &JsonValue) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        Ok(Arc::new(AzureOpenAiProvider::from_config(config)?))
    }

    fn validate_config(&self, config: &JsonValue) -> Result<(), ProviderError> {
        if !ApiCredential::is_available(config, "api_key", AZURE_OPENAI_API_KEY_ENV) {
            return Err(ProviderError::NotConfigured(format!(
                "Azure OpenAI configuration missing: set 'api_key' in config or {} env",
                AZURE_OPENAI_API_KEY_ENV
            )));
        }

        let Some(endpoint) =
            setting_from_config_or_env(config, "endpoint", AZURE_OPENAI_ENDPOINT_ENV)
        else {
            return Err(ProviderError::NotConfigured(format!(
                "Azure OpenAI configuration missing: set 'endpoint' in config or {} env",
                AZURE_OPENAI_ENDPOINT_ENV
            )));
        };

        if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            return Err(ProviderError::NotConfigured(
                "endpoint must start with http:// or https://".to_string(),
            ));
        }

        Ok(())
    }
}
