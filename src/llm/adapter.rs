use super::{ChatMessage, ChatModel};
use crate::constants::{HEALTH_PROBE_PROMPT, LOG_PROMPT_TRUNCATE_LENGTH};
use crate::error::ServerError;
use crate::schema::SchemaContext;
use crate::telemetry::truncate_for_log;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

const SQL_SYSTEM_PROMPT: &str = "\
You are an expert SQL author. Turn the user's request into a single SQL query.

Rules:
1. Reply with the SQL query only, without explanations or markdown.
2. Use standard SQL syntax.
3. When no schema is provided, assume conventional table names such as users, orders and products.
4. Join tables when the request spans more than one of them.
5. Filter with WHERE clauses and use date functions for time-based requests.

Examples:
- \"Show me all users\" -> SELECT * FROM users;
- \"Users who made orders\" -> SELECT u.* FROM users u JOIN orders o ON u.user_id = o.user_id;
- \"Count of orders per user\" -> SELECT u.user_id, COUNT(o.order_id) AS order_count FROM users u LEFT JOIN orders o ON u.user_id = o.user_id GROUP BY u.user_id;";

/// Health of the language model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmHealthStatus {
    Healthy,
    Unhealthy,
}

/// Result of the LLM health probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmHealth {
    pub status: LlmHealthStatus,
    pub provider: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LlmHealth {
    pub fn is_healthy(&self) -> bool {
        self.status == LlmHealthStatus::Healthy
    }
}

/// Wraps a [`ChatModel`] behind SQL generation and a health probe.
#[derive(Clone)]
pub struct LlmAdapter {
    model: Arc<dyn ChatModel>,
}

impl LlmAdapter {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    /// Generate SQL for `prompt`, returning the model's raw reply.
    ///
    /// When a non-empty schema context is given it is appended to the system
    /// instruction. The reply is not validated or parsed.
    pub async fn generate(
        &self,
        prompt: &str,
        schema: Option<&SchemaContext>,
    ) -> Result<String, ServerError> {
        let messages = [
            ChatMessage::system(system_prompt(schema)),
            ChatMessage::user(prompt),
        ];

        match self.model.chat(&messages).await {
            Ok(sql) => {
                info!(
                    "SQL generated successfully: {}",
                    truncate_for_log(&sql, LOG_PROMPT_TRUNCATE_LENGTH)
                );
                Ok(sql)
            }
            Err(e) => {
                error!("Error generating SQL with LLM: {}", e);
                Err(e)
            }
        }
    }

    /// Send a trivial probe prompt; any error marks the model unhealthy.
    pub async fn health(&self) -> LlmHealth {
        let probe = [ChatMessage::user(HEALTH_PROBE_PROMPT)];
        let (status, test_response, error) = match self.model.chat(&probe).await {
            Ok(reply) => (LlmHealthStatus::Healthy, Some(reply), None),
            Err(e) => (LlmHealthStatus::Unhealthy, None, Some(e.to_string())),
        };

        LlmHealth {
            status,
            provider: self.model.provider().to_string(),
            model: self.model.model().to_string(),
            test_response,
            error,
        }
    }
}

fn system_prompt(schema: Option<&SchemaContext>) -> String {
    match schema {
        Some(context) if !context.is_empty() => format!(
            "{}\n\nUse only the tables and columns of this database schema:\n{}",
            SQL_SYSTEM_PROMPT,
            context.to_prompt_text()
        ),
        _ => SQL_SYSTEM_PROMPT.to_string(),
    }
}
