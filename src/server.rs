//! HTTP server definition and lifecycle.

use crate::agent::DatabaseAgent;
use crate::config::Config;
use crate::error::ServerError;
use crate::handlers;
use crate::shutdown::SharedShutdownController;
use axum::routing::{get, post};
use axum::Router;
use std::future::IntoFuture;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// The SQL agent HTTP server.
///
/// Cloned into every request as axum state; the agent and configuration
/// are shared behind `Arc`s.
#[derive(Clone)]
pub struct SqlAgentServer {
    /// Configuration.
    config: Arc<Config>,

    /// Agent serving every endpoint.
    agent: Arc<DatabaseAgent>,
}

impl SqlAgentServer {
    /// Create a server, building the agent from `config`.
    ///
    /// Fails on an unusable LLM configuration or an unsupported schema
    /// database URL.
    pub async fn new(config: Config) -> Result<Self, ServerError> {
        let agent = DatabaseAgent::from_config(&config).await?;
        Ok(Self::with_agent(config, agent))
    }

    /// Create a server around an already-built agent.
    pub fn with_agent(config: Config, agent: DatabaseAgent) -> Self {
        Self {
            config: Arc::new(config),
            agent: Arc::new(agent),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn agent(&self) -> &DatabaseAgent {
        &self.agent
    }

    /// Build the router with all endpoints and the configured layers.
    pub fn router(&self) -> Router {
        let mut router = Router::new()
            .route("/", get(handlers::root))
            .route("/health", get(handlers::health))
            .route("/generate-sql", post(handlers::generate_sql))
            .route("/tools", get(handlers::tools))
            .route("/schema", get(handlers::schema))
            .route("/schema/health", get(handlers::schema_health))
            .with_state(self.clone());

        if self.config.server.enable_cors {
            router = router.layer(CorsLayer::permissive());
        }

        // Structured request/response logging
        if self.config.server.enable_tracing {
            router = router.layer(TraceLayer::new_for_http());
        }

        router
    }

    /// Bind and serve until `shutdown` fires.
    ///
    /// In-flight requests get the controller's drain timeout to finish.
    pub async fn serve(self, shutdown: SharedShutdownController) -> Result<(), ServerError> {
        let addr = self.config.server.bind_address();
        let listener = tokio::net::TcpListener::bind(&addr).await?;

        info!("HTTP server listening on http://{}", addr);
        if self.config.server.enable_tracing {
            info!("Request tracing enabled");
        }

        let mut graceful_signal = shutdown.signal();
        let server = axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                graceful_signal.recv().await;
                info!("HTTP server received shutdown signal");
            })
            .into_future();

        let mut drain_signal = shutdown.signal();
        let drain_timeout = shutdown.drain_timeout();
        let drain_deadline = async move {
            drain_signal.recv().await;
            tokio::time::sleep(drain_timeout).await;
        };

        tokio::select! {
            result = server => result?,
            _ = drain_deadline => {
                warn!(
                    "Drain timeout of {:?} exceeded, dropping remaining requests",
                    drain_timeout
                );
            }
        }

        info!("Server shutdown complete");
        Ok(())
    }
}
