use super::{ChatMessage, ChatModel};
use crate::config::{LlmConfig, LlmProvider};
use crate::error::ServerError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Client for OpenAI-style `/chat/completions` endpoints.
///
/// Serves both OpenAI itself and Ollama, which exposes the same API.
pub struct OpenAiCompatibleClient {
    client: Client,
    endpoint: String,
    provider: LlmProvider,
    model: String,
    api_key: Option<String>,
    temperature: Option<f32>,
}

impl OpenAiCompatibleClient {
    pub fn new(config: &LlmConfig) -> Result<Self, ServerError> {
        let api_key = config.api_key.clone().filter(|k| !k.trim().is_empty());
        if config.provider.requires_api_key() && api_key.is_none() {
            return Err(ServerError::config(format!(
                "llm.api_key (or OPENAI_API_KEY) is required for provider '{}'",
                config.provider
            )));
        }

        let base_url = config.effective_base_url().trim_end_matches('/');
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ServerError::config(format!(
                "invalid LLM base URL: '{}'",
                base_url
            )));
        }

        Ok(Self {
            client: Client::new(),
            endpoint: format!("{}/chat/completions", base_url),
            provider: config.provider,
            model: config.model.clone(),
            api_key,
            temperature: config.temperature,
        })
    }

    /// Full URL chat requests are posted to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ChatModel for OpenAiCompatibleClient {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, ServerError> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
        };

        let mut builder = self.client.post(&self.endpoint).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        debug!(
            "Sending {} message(s) to {} ({})",
            messages.len(),
            self.provider,
            self.model
        );

        let response = builder.send().await?.error_for_status()?;
        let parsed = response.json::<ChatCompletionResponse>().await?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ServerError::llm("provider response contained no message content"))
    }

    fn provider(&self) -> &str {
        self.provider.as_str()
    }

    fn model(&self) -> &str {
        &self.model
    }
}
