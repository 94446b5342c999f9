//! HTTP request handlers.
//!
//! Each handler wraps one [`DatabaseAgent`](crate::agent::DatabaseAgent)
//! operation. Failures are returned as [`ServerError`], which renders itself
//! as a `{"error": ...}` body with the matching status code.

use crate::agent::HealthReport;
use crate::constants::{API_VERSION, SERVICE_NAME};
use crate::error::ServerError;
use crate::schema::{SchemaHealth, SchemaSummary};
use crate::server::SqlAgentServer;
use crate::telemetry::RequestContext;
use crate::tools::{GenerateSqlInput, QueryResult, ToolManifest};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};
use tracing::{info, warn};

/// `GET /`
pub async fn root() -> Json<Value> {
    Json(json!({
        "message": SERVICE_NAME,
        "version": API_VERSION,
    }))
}

/// `GET /health`
pub async fn health(State(server): State<SqlAgentServer>) -> Json<HealthReport> {
    let ctx = RequestContext::new("health");
    let report = server.agent().health_check().await;

    info!(
        correlation_id = %ctx.correlation_id,
        status = ?report.status,
        elapsed_ms = ctx.elapsed().as_millis() as u64,
        "Health check completed"
    );

    Json(report)
}

/// `POST /generate-sql`
///
/// A result carrying an error becomes a 400 with that error as the message.
pub async fn generate_sql(
    State(server): State<SqlAgentServer>,
    payload: Result<Json<GenerateSqlInput>, JsonRejection>,
) -> Result<Json<QueryResult>, ServerError> {
    let ctx = RequestContext::new("generate_sql");

    let Json(input) = payload.map_err(|rejection| {
        warn!(correlation_id = %ctx.correlation_id, "Rejected request body: {}", rejection);
        ServerError::invalid_input(rejection.body_text())
    })?;

    let result = server.agent().generate_sql_query(&input.prompt).await;

    if let Some(error) = result.error() {
        warn!(
            correlation_id = %ctx.correlation_id,
            elapsed_ms = ctx.elapsed().as_millis() as u64,
            "SQL generation failed: {}",
            error
        );
        return Err(ServerError::generation(error));
    }

    info!(
        correlation_id = %ctx.correlation_id,
        elapsed_ms = ctx.elapsed().as_millis() as u64,
        "SQL generated"
    );

    Ok(Json(result))
}

/// `GET /tools`
pub async fn tools(State(server): State<SqlAgentServer>) -> Json<ToolManifest> {
    Json(server.agent().get_available_tools())
}

/// `GET /schema`
pub async fn schema(State(server): State<SqlAgentServer>) -> Json<SchemaSummary> {
    Json(server.agent().schema_summary())
}

/// `GET /schema/health`
pub async fn schema_health(State(server): State<SqlAgentServer>) -> Json<SchemaHealth> {
    let health = server.agent().schema_health();
    if health.refresh_stats.failures > 0 {
        warn!(
            status = ?health.status,
            failures = health.refresh_stats.failures,
            "Schema refreshes have failed"
        );
    }
    Json(health)
}
