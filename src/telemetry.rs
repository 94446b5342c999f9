//! Logging setup and request correlation.
//!
//! Logs always go to stderr. When `logging.file` is configured, every line is
//! also appended to that file through a non-blocking writer.

use crate::config::LoggingConfig;
use std::time::{Duration, Instant};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};
use uuid::Uuid;

/// Build the log filter.
///
/// `RUST_LOG` wins when set; otherwise the configured level applies to this
/// crate and to HTTP request tracing, with everything else at `warn`.
pub fn build_env_filter(level: &str) -> EnvFilter {
    std::env::var("RUST_LOG")
        .map(EnvFilter::new)
        .unwrap_or_else(|_| EnvFilter::new(default_filter_directives(level)))
}

fn default_filter_directives(level: &str) -> String {
    let level = level.trim().to_lowercase();
    format!("warn,sql_agent_server={level},tower_http={level}")
}

/// Initialize the global tracing subscriber.
///
/// The returned guard must be held for the life of the process so buffered
/// file output is flushed on exit.
pub fn init_logging(config: &LoggingConfig) -> std::io::Result<Option<WorkerGuard>> {
    let filter = build_env_filter(&config.level);

    let (file_layer, guard) = match &config.file {
        Some(path) => {
            let directory = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| std::path::Path::new("."));
            std::fs::create_dir_all(directory)?;
            let file_name = path.file_name().ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("logging.file has no file name: {}", path.display()),
                )
            })?;

            let appender = tracing_appender::rolling::never(directory, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false),
        )
        .with(file_layer)
        .init();

    Ok(guard)
}

/// Generate a short correlation ID (8 characters) for compact logging.
pub fn generate_short_correlation_id() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// Request context carrying correlation information through a request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Unique identifier for this request.
    pub correlation_id: String,
    /// When the request was received.
    pub start_time: Instant,
    /// Endpoint or operation being served.
    pub operation: &'static str,
}

impl RequestContext {
    pub fn new(operation: &'static str) -> Self {
        Self {
            correlation_id: generate_short_correlation_id(),
            start_time: Instant::now(),
            operation,
        }
    }

    /// Get the elapsed time since the request started.
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

/// Shorten `s` to at most `max_len` bytes for logging, respecting char boundaries.
pub fn truncate_for_log(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_directives() {
        assert_eq!(
            default_filter_directives(" DEBUG "),
            "warn,sql_agent_server=debug,tower_http=debug"
        );
    }

    #[test]
    fn test_correlation_id_length() {
        let id = generate_short_correlation_id();
        assert_eq!(id.len(), 8);
        assert_ne!(id, generate_short_correlation_id());
    }

    #[test]
    fn test_request_context() {
        let ctx = RequestContext::new("generate_sql");
        assert_eq!(ctx.operation, "generate_sql");
        assert_eq!(ctx.correlation_id.len(), 8);
        assert!(ctx.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_truncate_for_log() {
        assert_eq!(truncate_for_log("short", 50), "short");
        assert_eq!(truncate_for_log("abcdefghij", 4), "abcd...");
        // Never splits a multi-byte character
        assert_eq!(truncate_for_log("ééé", 3), "é...");
    }
}
