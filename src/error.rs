//! Error types for the SQL agent server.
//!
//! Every layer returns [`ServerError`]. At the HTTP edge it implements
//! [`axum::response::IntoResponse`]: business errors become 400 responses with
//! the message exposed, everything else becomes a 500 whose detail is only logged.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Domain-specific errors for the SQL agent server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Language model call failed
    #[error("LLM error: {message}")]
    Llm {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Schema graph could not be built or extracted
    #[error("Schema error: {0}")]
    Schema(String),

    /// Introspection database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// SQL generation reported an error
    #[error("{0}")]
    Generation(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an LLM error.
    pub fn llm(msg: impl Into<String>) -> Self {
        Self::Llm {
            message: msg.into(),
            source: None,
        }
    }

    /// Create an LLM error with a source.
    pub fn llm_with_source(
        msg: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Llm {
            message: msg.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a schema error.
    pub fn schema(msg: impl Into<String>) -> Self {
        Self::Schema(msg.into())
    }

    /// Create a generation error.
    pub fn generation(msg: impl Into<String>) -> Self {
        Self::Generation(msg.into())
    }

    /// Create an invalid input error.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Generation(_) | Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get a user-friendly suggestion for how to fix this error.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::Config(_) => Some("Check the configuration file and environment variables"),
            Self::Llm { .. } => Some("Check the LLM provider, model name, and API key"),
            Self::Schema(_) | Self::Database(_) => {
                Some("Check schema.database_url and that the database is reachable")
            }
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ServerError {
    fn from(e: reqwest::Error) -> Self {
        let message = match e.status() {
            Some(status) => format!("provider returned HTTP {}", status),
            None if e.is_decode() => "could not decode provider response".to_string(),
            None => "request to provider failed".to_string(),
        };
        ServerError::llm_with_source(message, e)
    }
}

impl From<toml::de::Error> for ServerError {
    fn from(e: toml::de::Error) -> Self {
        ServerError::config(format!("invalid configuration file: {}", e))
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let client_message = if status.is_client_error() {
            self.to_string()
        } else {
            error!(error = %self, "request failed");
            "internal server error".to_string()
        };
        (status, Json(json!({ "error": client_message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ServerError::generation("LLM Error").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServerError::invalid_input("empty").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServerError::llm("down").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ServerError::schema("catalog unreadable").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_generation_message_is_verbatim() {
        let err = ServerError::generation("LLM Error");
        assert_eq!(err.to_string(), "LLM Error");
    }

    #[test]
    fn test_error_suggestions() {
        assert!(ServerError::config("bad port").suggestion().is_some());
        assert!(ServerError::llm("401").suggestion().is_some());
        assert!(ServerError::generation("LLM Error").suggestion().is_none());
    }

    #[test]
    fn test_into_response_hides_internal_detail() {
        let response = ServerError::schema("secret path /etc/x").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response = ServerError::generation("LLM Error").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
