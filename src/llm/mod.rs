//! Language model integration.
//!
//! Providers implement [`ChatModel`]; [`LlmAdapter`] wraps one behind the
//! SQL-specific `generate` and `health` calls.

mod adapter;
mod openai;

pub use adapter::{LlmAdapter, LlmHealth, LlmHealthStatus};
pub use openai::OpenAiCompatibleClient;

use crate::config::LlmConfig;
use crate::error::ServerError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Role of a chat message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
}

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// A chat-completion capability offered by an LLM provider.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Send the conversation and return the model's reply text.
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, ServerError>;

    /// Provider name, for logs and health output.
    fn provider(&self) -> &str;

    /// Model identifier.
    fn model(&self) -> &str;
}

/// Build the chat model for the configured provider.
pub fn create_chat_model(config: &LlmConfig) -> Result<Arc<dyn ChatModel>, ServerError> {
    let client = OpenAiCompatibleClient::new(config)?;
    info!(
        "LLM initialized with provider: {} (model: {})",
        config.provider, config.model
    );
    Ok(Arc::new(client))
}
