//! Database schema metadata used as context for SQL generation.
//!
//! A [`SchemaGraphBuilder`] introspects a database and returns a raw
//! [`SchemaGraph`]. The [`SchemaCache`] turns that graph into an immutable
//! [`SchemaSnapshot`] and decides when it has gone stale.

mod cache;
mod sqlite;

pub use cache::{RefreshStats, SchemaCache, SchemaHealth, SchemaHealthStatus, SchemaSummary};
pub use sqlite::SqliteGraphBuilder;

use crate::config::SchemaConfig;
use crate::error::ServerError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Kind of link between two tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
    /// Declared foreign key constraint.
    #[default]
    ForeignKey,
    /// Relationship guessed from naming conventions.
    Inferred,
}

impl std::fmt::Display for RelationshipKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelationshipKind::ForeignKey => write!(f, "foreign_key"),
            RelationshipKind::Inferred => write!(f, "inferred"),
        }
    }
}

/// Table as reported by a schema graph builder.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphTable {
    pub name: String,
    pub columns: Vec<String>,
    pub primary_key: Option<String>,
    pub indexes: Vec<String>,
    pub row_count: u64,
}

/// Relationship as reported by a schema graph builder.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphRelationship {
    pub from_table: String,
    pub to_table: String,
    pub from_column: String,
    pub to_column: String,
    pub kind: RelationshipKind,
    pub confidence: f64,
}

/// Raw output of a schema graph builder.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaGraph {
    pub tables: Vec<GraphTable>,
    pub relationships: Vec<GraphRelationship>,
}

/// Introspects a database into a [`SchemaGraph`].
#[async_trait]
pub trait SchemaGraphBuilder: Send + Sync {
    async fn build_graph(&self) -> Result<SchemaGraph, ServerError>;
}

/// Table metadata held in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableInfo {
    pub name: String,
    /// Column names in declaration order, without duplicates.
    pub columns: Vec<String>,
    pub primary_key: Option<String>,
    pub indexes: Vec<String>,
    pub row_count: u64,
}

/// Relationship metadata held in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipInfo {
    pub from_table: String,
    pub to_table: String,
    pub from_column: String,
    pub to_column: String,
    #[serde(rename = "type")]
    pub kind: RelationshipKind,
    /// Always within `[0, 1]`.
    pub confidence: f64,
}

/// Immutable, fully populated schema metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaSnapshot {
    tables: Vec<TableInfo>,
    relationships: Vec<RelationshipInfo>,
    loaded_at: DateTime<Utc>,
}

impl SchemaSnapshot {
    /// Extract a snapshot from a builder graph.
    ///
    /// Fails as a whole if any table or relationship is malformed, so a
    /// partially extracted graph never becomes a snapshot.
    pub fn from_graph(graph: SchemaGraph) -> Result<Self, ServerError> {
        let tables = graph
            .tables
            .into_iter()
            .map(extract_table)
            .collect::<Result<Vec<_>, _>>()?;
        let relationships = graph
            .relationships
            .into_iter()
            .map(extract_relationship)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            tables,
            relationships,
            loaded_at: Utc::now(),
        })
    }

    pub fn tables(&self) -> &[TableInfo] {
        &self.tables
    }

    pub fn relationships(&self) -> &[RelationshipInfo] {
        &self.relationships
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// Context handed to callers.
    pub fn context(&self) -> SchemaContext {
        SchemaContext {
            tables: self.tables.clone(),
            relationships: self.relationships.clone(),
        }
    }
}

fn extract_table(table: GraphTable) -> Result<TableInfo, ServerError> {
    if table.name.is_empty() {
        return Err(ServerError::schema("table with an empty name"));
    }

    let mut columns: Vec<String> = Vec::with_capacity(table.columns.len());
    for column in table.columns {
        if !columns.contains(&column) {
            columns.push(column);
        }
    }

    Ok(TableInfo {
        name: table.name,
        columns,
        primary_key: table.primary_key,
        indexes: table.indexes,
        row_count: table.row_count,
    })
}

fn extract_relationship(rel: GraphRelationship) -> Result<RelationshipInfo, ServerError> {
    let endpoints = [&rel.from_table, &rel.to_table, &rel.from_column, &rel.to_column];
    if endpoints.iter().any(|s| s.is_empty()) {
        return Err(ServerError::schema(format!(
            "relationship {}.{} -> {}.{} has an empty endpoint",
            rel.from_table, rel.from_column, rel.to_table, rel.to_column
        )));
    }
    if !(0.0..=1.0).contains(&rel.confidence) {
        return Err(ServerError::schema(format!(
            "relationship {}.{} -> {}.{} has confidence {} outside [0, 1]",
            rel.from_table, rel.from_column, rel.to_table, rel.to_column, rel.confidence
        )));
    }

    Ok(RelationshipInfo {
        from_table: rel.from_table,
        to_table: rel.to_table,
        from_column: rel.from_column,
        to_column: rel.to_column,
        kind: rel.kind,
        confidence: rel.confidence,
    })
}

/// Tables and relationships returned to callers of the cache.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaContext {
    pub tables: Vec<TableInfo>,
    pub relationships: Vec<RelationshipInfo>,
}

impl SchemaContext {
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty() && self.relationships.is_empty()
    }

    /// Compact text rendering for inclusion in a prompt.
    pub fn to_prompt_text(&self) -> String {
        let mut text = String::new();

        if !self.tables.is_empty() {
            text.push_str("Tables:\n");
            for table in &self.tables {
                text.push_str(&format!("- {} ({})", table.name, table.columns.join(", ")));
                if let Some(pk) = &table.primary_key {
                    text.push_str(&format!(" [primary key: {}]", pk));
                }
                text.push('\n');
            }
        }

        if !self.relationships.is_empty() {
            text.push_str("Relationships:\n");
            for rel in &self.relationships {
                text.push_str(&format!(
                    "- {}.{} -> {}.{} ({})\n",
                    rel.from_table, rel.from_column, rel.to_table, rel.to_column, rel.kind
                ));
            }
        }

        text
    }
}

/// Build the schema cache described by `config`.
///
/// Returns a disabled cache when schema integration is off or has no
/// database URL; an unsupported URL is a configuration error. A database
/// that cannot be opened or introspected is only logged, and the cache
/// retries on the next `get_context`.
pub async fn create_schema_cache(config: &SchemaConfig) -> Result<SchemaCache, ServerError> {
    if !config.enabled {
        tracing::info!("Schema integration disabled in config");
        return Ok(SchemaCache::disabled());
    }

    let Some(url) = config.database_url.as_deref() else {
        tracing::warn!("Schema integration enabled but no schema.database_url provided; disabling");
        return Ok(SchemaCache::disabled());
    };

    let builder = SqliteGraphBuilder::connect_lazy(url)?;
    tracing::info!("Schema graph builder initialized successfully");

    let cache = SchemaCache::new(Arc::new(builder), config.refresh_interval());
    cache.refresh().await;
    Ok(cache)
}
