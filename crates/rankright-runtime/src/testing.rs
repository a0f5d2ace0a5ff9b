//! Scripted provider shared by the runtime's unit tests.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::providers::{
    ChatMessage, CompletionConfig, CompletionResponse, LlmProvider, ProviderError, TokenUsage,
};

type Responder =
    Box<dyn Fn(usize, &[ChatMessage], &CompletionConfig) -> Result<String, ProviderError> + Send + Sync>;

#[derive(Debug, Clone)]
pub(crate) struct RecordedCall {
    pub messages: Vec<ChatMessage>,
    pub config: CompletionConfig,
}

impl RecordedCall {
    pub fn user_prompt(&self) -> &str {
        self.messages
            .iter()
            .find(|m| m.role == "user")
            .map(|m| m.content.as_str())
            .unwrap_or("")
    }
}

/// Answers each call with a closure of (call index, messages, config).
pub(crate) struct ScriptedProvider {
    responder: Responder,
    calls: Mutex<Vec<RecordedCall>>,
    delay: Option<Duration>,
}

impl ScriptedProvider {
    pub fn new(
        responder: impl Fn(usize, &[ChatMessage], &CompletionConfig) -> Result<String, ProviderError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            responder: Box::new(responder),
            calls: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    pub fn replying(text: &str) -> Self {
        let text = text.to_string();
        Self::new(move |_, _, _| Ok(text.clone()))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        let index = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(RecordedCall {
                messages: messages.clone(),
                config: config.clone(),
            });
            calls.len() - 1
        };

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        (self.responder)(index, &messages, config).map(|content| CompletionResponse {
            content,
            usage: TokenUsage::default(),
            model: "scripted".to_string(),
            stop_reason: Some("stop".to_string()),
        })
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// A well-formed evaluation payload.
pub(crate) fn evaluation_json(ranking: &str, score: f64) -> String {
    serde_json::json!({
        "ranking": ranking,
        "score": score,
        "explanation": format!("{ranking} assessment"),
        "key_findings": ["finding"],
        "recommendations": [format!("improve {ranking}")]
    })
    .to_string()
}
