//! Agent facade composing the language model, schema cache and query tool.

use crate::config::Config;
use crate::constants::{API_VERSION, LOG_PROMPT_TRUNCATE_LENGTH};
use crate::error::ServerError;
use crate::llm::{create_chat_model, LlmAdapter, LlmHealth};
use crate::schema::{create_schema_cache, SchemaCache, SchemaHealth, SchemaSummary};
use crate::telemetry::truncate_for_log;
use crate::tools::{QueryResult, QueryTool, ToolManifest};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Overall agent status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Healthy,
    Unhealthy,
}

/// Response of [`DatabaseAgent::health_check`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: AgentStatus,
    pub llm_status: LlmHealth,
    pub timestamp: String,
    pub version: String,
}

/// Coordinates SQL generation and health reporting.
#[derive(Clone)]
pub struct DatabaseAgent {
    llm: LlmAdapter,
    schema: Arc<SchemaCache>,
    query_tool: QueryTool,
}

impl DatabaseAgent {
    pub fn new(llm: LlmAdapter, schema: Arc<SchemaCache>) -> Self {
        let query_tool = QueryTool::new(llm.clone(), schema.clone());
        Self {
            llm,
            schema,
            query_tool,
        }
    }

    /// Build the agent from configuration.
    ///
    /// Fails on an unusable LLM or schema configuration. A schema database
    /// that cannot be opened or introspected is only logged.
    pub async fn from_config(config: &Config) -> Result<Self, ServerError> {
        let model = create_chat_model(&config.llm)?;
        let schema = create_schema_cache(&config.schema).await?;

        info!(
            "Database agent initialized (provider: {}, model: {}, schema: {})",
            config.llm.provider,
            config.llm.model,
            if schema.is_enabled() { "enabled" } else { "disabled" }
        );

        Ok(Self::new(LlmAdapter::new(model), Arc::new(schema)))
    }

    /// Generate SQL for a natural language prompt.
    pub async fn generate_sql_query(&self, prompt: &str) -> QueryResult {
        let result = self.query_tool.generate_query(prompt).await;
        match result.error() {
            None => info!(
                "SQL generation completed for prompt: {}",
                truncate_for_log(prompt, LOG_PROMPT_TRUNCATE_LENGTH)
            ),
            Some(e) => warn!("SQL generation failed: {}", e),
        }
        result
    }

    /// Probe the language model.
    pub async fn health_check(&self) -> HealthReport {
        let llm_status = self.llm.health().await;
        let status = if llm_status.is_healthy() {
            AgentStatus::Healthy
        } else {
            warn!(
                "Health check failed: {}",
                llm_status.error.as_deref().unwrap_or("unknown error")
            );
            AgentStatus::Unhealthy
        };

        HealthReport {
            status,
            llm_status,
            timestamp: Utc::now().to_rfc3339(),
            version: API_VERSION.to_string(),
        }
    }

    /// Tools offered by this agent.
    pub fn get_available_tools(&self) -> ToolManifest {
        ToolManifest::builtin()
    }

    pub fn schema_summary(&self) -> SchemaSummary {
        self.schema.summary()
    }

    /// Schema integration health, including refresh counters.
    pub fn schema_health(&self) -> SchemaHealth {
        self.schema.health()
    }

    pub fn schema_cache(&self) -> &SchemaCache {
        &self.schema
    }
}
