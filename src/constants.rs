//! Centralized constants for the SQL agent server.
//!
//! This module contains the default values used throughout the codebase,
//! making them easy to find, understand, and modify.

// =============================================================================
// API Constants
// =============================================================================

/// Version reported by the HTTP API and the tool manifest.
pub const API_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Human-readable service name returned by the root endpoint.
pub const SERVICE_NAME: &str = "SQL Agent Server";

/// Name of the single tool exposed by the agent.
pub const GENERATE_SQL_TOOL_NAME: &str = "generate_sql_query";

// =============================================================================
// Configuration Defaults
// =============================================================================

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "config/agent.toml";

/// Default LLM model.
pub const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";

/// Default OpenAI API base URL.
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Default Ollama (OpenAI-compatible) base URL.
pub const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11434/v1";

/// Default HTTP bind host.
pub const DEFAULT_SERVER_HOST: &str = "localhost";

/// Default HTTP port.
pub const DEFAULT_SERVER_PORT: u16 = 8000;

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

// =============================================================================
// Schema Cache Constants
// =============================================================================

/// Default schema refresh interval in seconds.
pub const DEFAULT_SCHEMA_REFRESH_SECS: u64 = 3600;

/// Confidence assigned to relationships declared as foreign keys.
pub const DECLARED_RELATIONSHIP_CONFIDENCE: f64 = 1.0;

// =============================================================================
// LLM Constants
// =============================================================================

/// Prompt sent to the model by the health probe.
pub const HEALTH_PROBE_PROMPT: &str = "Generate: SELECT 1;";

// =============================================================================
// Logging Constants
// =============================================================================

/// Truncation length for prompts and generated SQL in log lines.
pub const LOG_PROMPT_TRUNCATE_LENGTH: usize = 50;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_interval_default() {
        assert_eq!(DEFAULT_SCHEMA_REFRESH_SECS, 3600);
    }

    #[test]
    fn test_api_version_matches_package() {
        assert_eq!(API_VERSION, "1.0.0");
    }
}
