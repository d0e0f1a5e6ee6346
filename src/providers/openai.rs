use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    config::LlmConfig,
    error::NodeExecutionError,
    providers::{LlmProvider, LlmRequest, LlmResponse},
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Chat-completions client for OpenAI and compatible servers (vLLM, Ollama, OpenRouter, ...).
pub struct OpenAiProvider {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiProvider {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            model: model.into(),
        }
    }

    /// Build from the `[llm]` config section; the key is read from `api_key_env`.
    pub fn from_config(config: &LlmConfig) -> Self {
        let api_key = std::env::var(&config.api_key_env).ok().filter(|k| !k.is_empty());
        Self::new(config.base_url.clone(), api_key, config.model.clone())
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn complete(
        &self,
        request: LlmRequest,
    ) -> Result<LlmResponse, NodeExecutionError> {
        let model = request.model.as_deref().unwrap_or(&self.model);
        let mut messages = Vec::new();
        if let Some(system) = request.system_prompt.as_deref() {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: &request.prompt,
        });

        let body = ChatRequest {
            model,
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        debug!(model, base_url = %self.base_url, "chat completion request");
        let mut builder = self.http.post(format!("{}/chat/completions", self.base_url)).timeout(REQUEST_TIMEOUT).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                NodeExecutionError::timeout(format!("llm request timed out: {}", e))
            } else {
                NodeExecutionError::provider(format!("llm request failed: {}", e), None)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(NodeExecutionError::provider(format!("llm returned {}: {}", status, text), Some(status.as_u16())));
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| NodeExecutionError::provider(format!("invalid llm response: {}", e), None))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| NodeExecutionError::provider("llm response has no choices", Some(status.as_u16())))?;

        Ok(LlmResponse {
            content,
            model: parsed.model.or_else(|| Some(model.to_string())),
        })
    }
}
