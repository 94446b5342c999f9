//! The SQL generation tool.
//!
//! - `generate_sql_query`: turn a natural-language prompt into a SQL query
//!
//! A [`QueryTool`] never fails outright: provider errors are folded into the
//! returned [`QueryResult`].

use crate::constants::{API_VERSION, GENERATE_SQL_TOOL_NAME, LOG_PROMPT_TRUNCATE_LENGTH};
use crate::llm::LlmAdapter;
use crate::schema::SchemaCache;
use crate::telemetry::truncate_for_log;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info};

/// Input for `generate_sql_query`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateSqlInput {
    /// Natural language description of the desired query.
    pub prompt: String,
}

/// Outcome of one SQL generation call.
///
/// Exactly one of `sql_query` and `error` is set. `sql_query` is always
/// serialized (as `null` on failure); `explanation` and `error` are omitted
/// when absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryResult {
    sql_query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    explanation: Option<String>,
    prompt: String,
    timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl QueryResult {
    /// Successful generation.
    pub fn success(prompt: impl Into<String>, sql_query: impl Into<String>) -> Self {
        let prompt = prompt.into();
        Self {
            sql_query: Some(sql_query.into()),
            explanation: Some(format!("Generated SQL query for: {}", prompt)),
            prompt,
            timestamp: Utc::now().to_rfc3339(),
            error: None,
        }
    }

    /// Failed generation.
    pub fn failure(prompt: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            sql_query: None,
            explanation: None,
            prompt: prompt.into(),
            timestamp: Utc::now().to_rfc3339(),
            error: Some(error.into()),
        }
    }

    pub fn sql_query(&self) -> Option<&str> {
        self.sql_query.as_deref()
    }

    pub fn explanation(&self) -> Option<&str> {
        self.explanation.as_deref()
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// RFC 3339 generation time.
    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

/// Entry in the tool manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub schema: Value,
}

/// List of tools the agent offers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolManifest {
    pub tools: Vec<ToolDescriptor>,
    pub version: String,
}

impl ToolManifest {
    /// The fixed single-tool manifest.
    pub fn builtin() -> Self {
        Self {
            tools: vec![ToolDescriptor {
                name: GENERATE_SQL_TOOL_NAME.to_string(),
                description: "Generate SQL queries from natural language".to_string(),
                schema: QueryTool::tool_schema(),
            }],
            version: API_VERSION.to_string(),
        }
    }
}

/// Generates SQL with the language model, using schema context when available.
#[derive(Clone)]
pub struct QueryTool {
    llm: LlmAdapter,
    schema: Arc<SchemaCache>,
}

impl QueryTool {
    pub fn new(llm: LlmAdapter, schema: Arc<SchemaCache>) -> Self {
        Self { llm, schema }
    }

    /// Generate SQL for `prompt`.
    ///
    /// Provider errors become a failed [`QueryResult`]; the returned text is
    /// not checked for being valid SQL.
    pub async fn generate_query(&self, prompt: &str) -> QueryResult {
        info!(
            "Generating SQL for prompt: {}",
            truncate_for_log(prompt, LOG_PROMPT_TRUNCATE_LENGTH)
        );

        let context = self.schema.get_context(prompt).await;

        match self.llm.generate(prompt, context.as_ref()).await {
            Ok(sql) => QueryResult::success(prompt, sql),
            Err(e) => {
                error!("Error in query tool: {}", e);
                QueryResult::failure(prompt, e.to_string())
            }
        }
    }

    /// JSON Schema description of the tool's input and output.
    pub fn tool_schema() -> Value {
        json!({
            "name": GENERATE_SQL_TOOL_NAME,
            "description": "Generate SQL queries from natural language descriptions",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "prompt": {
                        "type": "string",
                        "description": "Natural language description of the desired SQL query"
                    }
                },
                "required": ["prompt"]
            },
            "outputSchema": {
                "type": "object",
                "properties": {
                    "sql_query": { "type": "string", "description": "Generated SQL query" },
                    "explanation": { "type": "string", "description": "Explanation of the generated query" },
                    "error": { "type": "string", "description": "Error message if generation failed" },
                    "prompt": { "type": "string", "description": "Original prompt" },
                    "timestamp": { "type": "string", "description": "Timestamp of generation" }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServerError;
    use crate::llm::{ChatMessage, ChatModel};
    use async_trait::async_trait;

    struct FixedModel(Result<&'static str, &'static str>);

    #[async_trait]
    impl ChatModel for FixedModel {
        async fn chat(&self, _messages: &[ChatMessage]) -> Result<String, ServerError> {
            self.0.map(str::to_string).map_err(ServerError::llm)
        }

        fn provider(&self) -> &str {
            "mock"
        }

        fn model(&self) -> &str {
            "mock-model"
        }
    }

    fn tool(reply: Result<&'static str, &'static str>) -> QueryTool {
        QueryTool::new(
            LlmAdapter::new(Arc::new(FixedModel(reply))),
            Arc::new(SchemaCache::disabled()),
        )
    }

    #[tokio::test]
    async fn test_generate_query_success() {
        let result = tool(Ok("SELECT * FROM users;"))
            .generate_query("Show me all users")
            .await;

        assert_eq!(result.sql_query(), Some("SELECT * FROM users;"));
        assert!(result.error().is_none());
        assert_eq!(result.prompt(), "Show me all users");
        assert_eq!(
            result.explanation(),
            Some("Generated SQL query for: Show me all users")
        );
        assert!(chrono::DateTime::parse_from_rfc3339(result.timestamp()).is_ok());
    }

    #[tokio::test]
    async fn test_generate_query_failure() {
        let result = tool(Err("LLM Error")).generate_query("Show me all users").await;

        assert!(result.sql_query().is_none());
        assert!(result.error().unwrap().contains("LLM Error"));
        assert!(result.explanation().is_none());
        assert_eq!(result.prompt(), "Show me all users");
    }

    #[test]
    fn test_result_serialization() {
        let value = serde_json::to_value(QueryResult::failure("p", "boom")).unwrap();
        assert!(value["sql_query"].is_null());
        assert_eq!(value["error"], "boom");
        assert!(value.get("explanation").is_none());

        let value = serde_json::to_value(QueryResult::success("p", "SELECT 1;")).unwrap();
        assert_eq!(value["sql_query"], "SELECT 1;");
        assert!(value.get("error").is_none());
    }

    #[test]
    fn test_tool_schema() {
        let schema = QueryTool::tool_schema();
        assert_eq!(schema["name"], GENERATE_SQL_TOOL_NAME);
        assert_eq!(schema["inputSchema"]["required"], json!(["prompt"]));
        assert!(schema["outputSchema"]["properties"]["sql_query"].is_object());
    }

    #[test]
    fn test_builtin_manifest() {
        let manifest = ToolManifest::builtin();
        assert_eq!(manifest.tools.len(), 1);
        assert_eq!(manifest.tools[0].name, GENERATE_SQL_TOOL_NAME);
        assert_eq!(manifest.version, API_VERSION);
    }
}
