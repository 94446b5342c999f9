//! SQL Agent Server entry point.
//!
//! Loads configuration, initializes logging and serves the HTTP API until a
//! shutdown signal arrives.

use anyhow::{Context, Result};
use clap::Parser;
use sql_agent_server::constants::{API_VERSION, SERVICE_NAME};
use sql_agent_server::shutdown::{install_signal_handlers, new_shutdown_controller};
use sql_agent_server::telemetry::init_logging;
use sql_agent_server::{Config, ServerError, SqlAgentServer};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "sql-agent-server")]
#[command(version, about = "Natural-language to SQL agent over HTTP", long_about = None)]
struct Cli {
    /// Path to a TOML config file (defaults to config/agent.toml when present)
    #[arg(short, long, env = "SQL_AGENT_CONFIG")]
    config: Option<PathBuf>,

    /// Host to bind, overriding config and SERVER_HOST
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, overriding config and SERVER_PORT
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())
        .inspect_err(print_suggestion)
        .context("failed to load configuration")?;
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    // Held until exit so buffered file logs are flushed
    let _log_guard = init_logging(&config.logging).context("failed to initialize logging")?;

    std::panic::set_hook(Box::new(|info| {
        eprintln!("[PANIC] {}", info);
    }));

    info!("{} v{} starting...", SERVICE_NAME, API_VERSION);
    info!(
        "Schema integration: {}",
        if config.schema_integration_active() { "active" } else { "inactive" }
    );

    let shutdown_controller = new_shutdown_controller();
    install_signal_handlers(shutdown_controller.clone());

    let server = SqlAgentServer::new(config)
        .await
        .inspect_err(print_suggestion)
        .context("failed to initialize server")?;
    info!("Server initialized. Ready to accept requests...");

    server.serve(shutdown_controller).await?;

    Ok(())
}

fn print_suggestion(error: &ServerError) {
    if let Some(hint) = error.suggestion() {
        eprintln!("Hint: {}", hint);
    }
}
