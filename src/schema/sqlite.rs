//! SQLite schema introspection.

use super::{GraphRelationship, GraphTable, RelationshipKind, SchemaGraph, SchemaGraphBuilder};
use crate::constants::DECLARED_RELATIONSHIP_CONFIDENCE;
use crate::error::ServerError;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::{debug, warn};

/// Builds a [`SchemaGraph`] from a SQLite database's catalog.
#[derive(Clone)]
pub struct SqliteGraphBuilder {
    pool: SqlitePool,
}

impl SqliteGraphBuilder {
    /// Prepare a builder for the database at `url` (a `sqlite:` URL).
    ///
    /// Only the URL is checked here. The connection opens on first use, so an
    /// unreachable database surfaces as a failed `build_graph`. Once open, the
    /// single connection is kept so `sqlite::memory:` databases survive
    /// between introspections.
    pub fn connect_lazy(url: &str) -> Result<Self, ServerError> {
        if !url.starts_with("sqlite:") {
            return Err(ServerError::config(format!(
                "unsupported schema.database_url '{}': only sqlite: URLs are supported",
                url
            )));
        }

        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| ServerError::config(format!("invalid schema.database_url: {}", e)))?;

        debug!("Schema database configured at {}", url);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_lazy_with(options);

        Ok(Self { pool })
    }

    /// Underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn table_names(&self) -> Result<Vec<String>, ServerError> {
        let names = sqlx::query_scalar::<_, String>(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY rowid",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(names)
    }

    async fn describe_table(&self, name: &str) -> Result<GraphTable, ServerError> {
        let columns: Vec<(String, i64)> =
            sqlx::query_as("SELECT name, pk FROM pragma_table_info(?) ORDER BY cid")
                .bind(name)
                .fetch_all(&self.pool)
                .await?;

        let mut pk_columns: Vec<&(String, i64)> = columns.iter().filter(|(_, pk)| *pk > 0).collect();
        pk_columns.sort_by_key(|(_, pk)| *pk);
        let primary_key = if pk_columns.is_empty() {
            None
        } else {
            Some(
                pk_columns
                    .iter()
                    .map(|(column, _)| column.as_str())
                    .collect::<Vec<_>>()
                    .join(","),
            )
        };

        let indexes = sqlx::query_scalar::<_, String>("SELECT name FROM pragma_index_list(?)")
            .bind(name)
            .fetch_all(&self.pool)
            .await?;

        let count_sql = format!("SELECT COUNT(*) FROM {}", quote_ident(name));
        let row_count: i64 = sqlx::query_scalar(&count_sql)
            .fetch_one(&self.pool)
            .await?;

        let row_count = u64::try_from(row_count).unwrap_or_else(|_| {
            debug!("COUNT(*) for {} returned {}, reporting 0", name, row_count);
            0
        });

        Ok(GraphTable {
            name: name.to_string(),
            columns: columns.into_iter().map(|(column, _)| column).collect(),
            primary_key,
            indexes,
            row_count,
        })
    }

    async fn foreign_keys(
        &self,
        table: &str,
        tables: &[GraphTable],
    ) -> Result<Vec<GraphRelationship>, ServerError> {
        let rows: Vec<(String, String, Option<String>)> = sqlx::query_as(
            r#"SELECT "table", "from", "to" FROM pragma_foreign_key_list(?) ORDER BY id, seq"#,
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await?;

        let mut relationships = Vec::with_capacity(rows.len());
        for (to_table, from_column, to_column) in rows {
            // A REFERENCES clause without a column list targets the primary key
            let to_column = match to_column.or_else(|| referenced_primary_key(tables, &to_table)) {
                Some(column) => column,
                None => {
                    warn!(
                        "Skipping foreign key {}.{} -> {}: target column unknown",
                        table, from_column, to_table
                    );
                    continue;
                }
            };

            relationships.push(GraphRelationship {
                from_table: table.to_string(),
                to_table,
                from_column,
                to_column,
                kind: RelationshipKind::ForeignKey,
                confidence: DECLARED_RELATIONSHIP_CONFIDENCE,
            });
        }

        Ok(relationships)
    }
}

#[async_trait]
impl SchemaGraphBuilder for SqliteGraphBuilder {
    async fn build_graph(&self) -> Result<SchemaGraph, ServerError> {
        let names = self.table_names().await?;

        let mut tables = Vec::with_capacity(names.len());
        for name in &names {
            tables.push(self.describe_table(name).await?);
        }

        let mut relationships = Vec::new();
        for name in &names {
            relationships.extend(self.foreign_keys(name, &tables).await?);
        }

        debug!(
            "Introspected {} tables and {} foreign keys",
            tables.len(),
            relationships.len()
        );

        Ok(SchemaGraph {
            tables,
            relationships,
        })
    }
}

fn referenced_primary_key(tables: &[GraphTable], name: &str) -> Option<String> {
    tables
        .iter()
        .find(|t| t.name == name)
        .and_then(|t| t.primary_key.clone())
        .filter(|pk| !pk.contains(','))
}

/// Quote an identifier for interpolation into SQL.
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
