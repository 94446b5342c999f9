//! Configuration management for the SQL agent server.
//!
//! Configuration is read from a TOML file and then overlaid with environment
//! variables. Every key has a default, so a missing default file is not an error.

use crate::constants::{
    DEFAULT_CONFIG_PATH, DEFAULT_LLM_MODEL, DEFAULT_LOG_LEVEL, DEFAULT_OLLAMA_BASE_URL,
    DEFAULT_OPENAI_BASE_URL, DEFAULT_SCHEMA_REFRESH_SECS, DEFAULT_SERVER_HOST,
    DEFAULT_SERVER_PORT,
};
use crate::error::ServerError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Language model configuration
    pub llm: LlmConfig,

    /// Schema integration configuration
    pub schema: SchemaConfig,

    /// HTTP server configuration
    pub server: ServerConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Supported language model providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// OpenAI chat completions API.
    #[default]
    OpenAi,

    /// Ollama's OpenAI-compatible endpoint.
    Ollama,
}

impl LlmProvider {
    /// Get the provider name as used in configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            LlmProvider::OpenAi => "openai",
            LlmProvider::Ollama => "ollama",
        }
    }

    /// Default API base URL for this provider.
    pub fn default_base_url(&self) -> &'static str {
        match self {
            LlmProvider::OpenAi => DEFAULT_OPENAI_BASE_URL,
            LlmProvider::Ollama => DEFAULT_OLLAMA_BASE_URL,
        }
    }

    /// Whether the provider refuses requests without an API key.
    pub fn requires_api_key(&self) -> bool {
        matches!(self, LlmProvider::OpenAi)
    }
}

impl std::fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when parsing a provider name fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseLlmProviderError(String);

impl std::fmt::Display for ParseLlmProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown LLM provider: '{}'", self.0)
    }
}

impl std::error::Error for ParseLlmProviderError {}

impl std::str::FromStr for LlmProvider {
    type Err = ParseLlmProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" | "open_ai" | "open-ai" => Ok(LlmProvider::OpenAi),
            "ollama" => Ok(LlmProvider::Ollama),
            _ => Err(ParseLlmProviderError(s.to_string())),
        }
    }
}

/// Language model configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider to send chat requests to
    pub provider: LlmProvider,

    /// Model identifier
    pub model: String,

    /// API key (never serialized back out)
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Override for the provider's API base URL
    pub base_url: Option<String>,

    /// Sampling temperature passed through to the provider
    pub temperature: Option<f32>,
}

impl LlmConfig {
    /// The base URL requests are sent to.
    pub fn effective_base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.provider.default_base_url())
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            model: DEFAULT_LLM_MODEL.to_string(),
            api_key: None,
            base_url: None,
            temperature: None,
        }
    }
}

/// Schema integration configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    /// Whether schema context is fetched at all
    pub enabled: bool,

    /// Database to introspect (e.g. `sqlite://app.db`)
    pub database_url: Option<String>,

    /// Refresh interval in seconds
    #[serde(rename = "refresh_interval")]
    pub refresh_interval_secs: u64,
}

impl SchemaConfig {
    /// Refresh interval as Duration.
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            database_url: None,
            refresh_interval_secs: DEFAULT_SCHEMA_REFRESH_SECS,
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Enable permissive CORS
    pub enable_cors: bool,

    /// Enable request tracing via tower-http TraceLayer
    pub enable_tracing: bool,
}

impl ServerConfig {
    /// `host:port` bind address.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_SERVER_HOST.to_string(),
            port: DEFAULT_SERVER_PORT,
            enable_cors: true,
            enable_tracing: true,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Level for this crate's logs (`RUST_LOG` takes precedence)
    pub level: String,

    /// Optional file that receives a copy of every log line
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            file: None,
        }
    }
}

impl Config {
    /// Load configuration from a file and overlay environment variables.
    ///
    /// An explicitly given `path` must be readable. Without one, the default
    /// path is used if it exists, otherwise built-in defaults.
    ///
    /// # Environment Variables
    ///
    /// - `OPENAI_API_KEY`: API key (`llm.api_key`)
    /// - `LLM_PROVIDER`: provider name (`llm.provider`)
    /// - `LLM_MODEL`: model identifier (`llm.model`)
    /// - `SERVER_HOST`: bind host (`server.host`)
    /// - `SERVER_PORT`: bind port (`server.port`)
    /// - `LOG_LEVEL`: log level (`logging.level`)
    pub fn load(path: Option<&Path>) -> Result<Self, ServerError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_PATH);
                if default_path.exists() {
                    Self::from_file(default_path)?
                } else {
                    debug!("No configuration file at {}, using defaults", DEFAULT_CONFIG_PATH);
                    Self::default()
                }
            }
        };

        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Parse a configuration file without applying environment overrides.
    pub fn from_file(path: &Path) -> Result<Self, ServerError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ServerError::config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&contents)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self, ServerError> {
        Ok(toml::from_str(contents)?)
    }

    /// Overlay values from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<(), ServerError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Overlay values from an arbitrary variable lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ServerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.llm.api_key = Some(key);
        }

        if let Some(provider) = lookup("LLM_PROVIDER") {
            self.llm.provider = provider
                .parse()
                .map_err(|e: ParseLlmProviderError| ServerError::config(e.to_string()))?;
        }

        if let Some(model) = lookup("LLM_MODEL") {
            self.llm.model = model;
        }

        if let Some(host) = lookup("SERVER_HOST") {
            self.server.host = host;
        }

        if let Some(port) = lookup("SERVER_PORT") {
            self.server.port = port.trim().parse().map_err(|_| {
                ServerError::config(format!("SERVER_PORT must be a port number, got '{}'", port))
            })?;
        }

        if let Some(level) = lookup("LOG_LEVEL") {
            self.logging.level = level;
        }

        Ok(())
    }

    /// Whether schema integration is both enabled and pointed at a database.
    pub fn schema_integration_active(&self) -> bool {
        self.schema.enabled && self.schema.database_url.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.llm.provider, LlmProvider::OpenAi);
        assert!(!config.schema.enabled);
        assert_eq!(config.schema.refresh_interval(), Duration::from_secs(3600));
        assert_eq!(config.server.host, "localhost");
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_parse_partial_toml() {
        let config = Config::from_toml_str(
            r#"
            [llm]
            provider = "openai"
            model = "gpt-4"
            api_key = "test-key"

            [schema]
            enabled = true
            database_url = "sqlite::memory:"
            refresh_interval = 120
            "#,
        )
        .unwrap();

        assert_eq!(config.llm.model, "gpt-4");
        assert_eq!(config.llm.api_key.as_deref(), Some("test-key"));
        assert!(config.schema.enabled);
        assert_eq!(config.schema.refresh_interval(), Duration::from_secs(120));
        // Untouched sections keep their defaults
        assert_eq!(config.server.port, 8000);
        assert!(config.schema_integration_active());
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = Config::from_toml_str("[server]\nport = \"not a number\"").unwrap_err();
        assert!(matches!(err, ServerError::Config(_)));
    }

    #[test]
    fn test_env_overrides_file_values() {
        let mut config = Config::from_toml_str(
            r#"
            [llm]
            model = "gpt-4"
            [server]
            port = 9000
            "#,
        )
        .unwrap();

        config
            .apply_overrides(lookup_from(&[
                ("OPENAI_API_KEY", "sk-env"),
                ("LLM_PROVIDER", "Ollama"),
                ("LLM_MODEL", "llama3"),
                ("SERVER_HOST", "0.0.0.0"),
                ("SERVER_PORT", "8080"),
                ("LOG_LEVEL", "debug"),
            ]))
            .unwrap();

        assert_eq!(config.llm.api_key.as_deref(), Some("sk-env"));
        assert_eq!(config.llm.provider, LlmProvider::Ollama);
        assert_eq!(config.llm.model, "llama3");
        assert_eq!(config.server.bind_address(), "0.0.0.0:8080");
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_invalid_port_override_is_fatal() {
        let mut config = Config::default();
        let err = config
            .apply_overrides(lookup_from(&[("SERVER_PORT", "eighty")]))
            .unwrap_err();
        assert!(matches!(err, ServerError::Config(_)));
    }

    #[test]
    fn test_unknown_provider_override_is_fatal() {
        let mut config = Config::default();
        let err = config
            .apply_overrides(lookup_from(&[("LLM_PROVIDER", "carrier-pigeon")]))
            .unwrap_err();
        assert!(err.to_string().contains("carrier-pigeon"));
    }

    #[test]
    fn test_effective_base_url() {
        let mut llm = LlmConfig::default();
        assert_eq!(llm.effective_base_url(), "https://api.openai.com/v1");

        llm.provider = LlmProvider::Ollama;
        assert_eq!(llm.effective_base_url(), "http://localhost:11434/v1");

        llm.base_url = Some("http://proxy:9999/v1".to_string());
        assert_eq!(llm.effective_base_url(), "http://proxy:9999/v1");
    }

    #[test]
    fn test_schema_enabled_without_url_is_inactive() {
        let mut config = Config::default();
        config.schema.enabled = true;
        assert!(!config.schema_integration_active());
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let err = Config::load(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert!(matches!(err, ServerError::Config(_)));
    }
}
