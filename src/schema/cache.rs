//! Schema snapshot caching with time-based refresh.
//!
//! The cache holds at most one [`SchemaSnapshot`], replaced wholesale on each
//! successful refresh. A failed refresh is logged and the previous snapshot
//! stays in place.

use super::{SchemaContext, SchemaGraphBuilder, SchemaSnapshot};
use crate::constants::LOG_PROMPT_TRUNCATE_LENGTH;
use crate::telemetry::truncate_for_log;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, error, info};

/// Snapshot plus the monotonic time it was loaded.
#[derive(Debug, Clone)]
struct CachedSnapshot {
    snapshot: Arc<SchemaSnapshot>,
    refreshed_at: Instant,
}

/// Refresh counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshStats {
    /// Refreshes that replaced the snapshot.
    pub successes: u64,

    /// Refreshes that failed and kept the previous snapshot.
    pub failures: u64,
}

/// Point-in-time description of the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaSummary {
    /// Whether schema integration is active.
    pub enabled: bool,

    /// Explanation shown when integration is disabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Tables in the current snapshot, 0 when nothing has loaded.
    pub tables: usize,

    /// Relationships in the current snapshot, 0 when nothing has loaded.
    pub relationships: usize,

    /// When the current snapshot was loaded (RFC 3339).
    pub last_refresh: Option<DateTime<Utc>>,

    /// True while a snapshot exists and is younger than the refresh interval.
    pub cache_valid: bool,
}

/// Schema integration status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaHealthStatus {
    /// Integration enabled and a snapshot has loaded.
    Healthy,
    /// Integration enabled but nothing has loaded yet.
    Degraded,
    Disabled,
}

/// Schema health report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaHealth {
    pub status: SchemaHealthStatus,
    pub schema_summary: SchemaSummary,
    pub refresh_stats: RefreshStats,
    pub timestamp: String,
}

/// Cache of the most recent schema snapshot.
pub struct SchemaCache {
    /// Source of fresh graphs; `None` means schema integration is disabled.
    builder: Option<Arc<dyn SchemaGraphBuilder>>,

    /// Age after which the snapshot is stale.
    refresh_interval: Duration,

    /// Current snapshot, absent until the first successful load.
    current: RwLock<Option<CachedSnapshot>>,

    /// Serializes rebuilds so concurrent stale readers trigger one rebuild.
    refresh_lock: Mutex<()>,

    successes: AtomicU64,
    failures: AtomicU64,
}

impl SchemaCache {
    /// Create an enabled cache backed by `builder`.
    pub fn new(builder: Arc<dyn SchemaGraphBuilder>, refresh_interval: Duration) -> Self {
        Self {
            builder: Some(builder),
            refresh_interval,
            current: RwLock::new(None),
            refresh_lock: Mutex::new(()),
            successes: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    /// Create a cache that never loads anything.
    pub fn disabled() -> Self {
        Self {
            builder: None,
            refresh_interval: Duration::ZERO,
            current: RwLock::new(None),
            refresh_lock: Mutex::new(()),
            successes: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    /// Check if schema integration is enabled.
    pub fn is_enabled(&self) -> bool {
        self.builder.is_some()
    }

    /// Configured refresh interval.
    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    /// Stale if nothing has loaded yet or the snapshot outlived the interval.
    pub fn is_stale(&self) -> bool {
        match &*self.current.read() {
            None => true,
            Some(cached) => cached.refreshed_at.elapsed() > self.refresh_interval,
        }
    }

    /// Current snapshot, if one has ever loaded.
    pub fn snapshot(&self) -> Option<Arc<SchemaSnapshot>> {
        self.current.read().as_ref().map(|c| c.snapshot.clone())
    }

    /// Wall-clock time of the last successful load.
    pub fn last_refresh(&self) -> Option<DateTime<Utc>> {
        self.current.read().as_ref().map(|c| c.snapshot.loaded_at())
    }

    /// Get refresh counters.
    pub fn stats(&self) -> RefreshStats {
        RefreshStats {
            successes: self.successes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }

    /// Schema context for a prompt.
    ///
    /// Returns `None` when disabled. Otherwise refreshes first if stale and
    /// returns whatever snapshot is current afterwards, which is empty when
    /// nothing has ever loaded.
    pub async fn get_context(&self, prompt: &str) -> Option<SchemaContext> {
        if !self.is_enabled() {
            return None;
        }

        if self.is_stale() {
            self.refresh_if_stale().await;
        }

        debug!(
            "Providing schema context for prompt: {}",
            truncate_for_log(prompt, LOG_PROMPT_TRUNCATE_LENGTH)
        );

        Some(
            self.snapshot()
                .map(|s| s.context())
                .unwrap_or_default(),
        )
    }

    /// Rebuild unless another caller refreshed while we waited for the lock.
    async fn refresh_if_stale(&self) {
        let _guard = self.refresh_lock.lock().await;
        if self.is_stale() {
            self.load().await;
        }
    }

    /// Rebuild the snapshot now. Returns whether the rebuild succeeded.
    pub async fn refresh(&self) -> bool {
        if !self.is_enabled() {
            return false;
        }
        let _guard = self.refresh_lock.lock().await;
        self.load().await
    }

    async fn load(&self) -> bool {
        let Some(builder) = &self.builder else {
            return false;
        };

        let result = builder
            .build_graph()
            .await
            .and_then(SchemaSnapshot::from_graph);

        match result {
            Ok(snapshot) => {
                info!(
                    "Schema loaded: {} tables, {} relationships",
                    snapshot.tables().len(),
                    snapshot.relationships().len()
                );
                *self.current.write() = Some(CachedSnapshot {
                    snapshot: Arc::new(snapshot),
                    refreshed_at: Instant::now(),
                });
                self.successes.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(e) => {
                error!("Failed to load schema, keeping previous snapshot: {}", e);
                self.failures.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Summary of the cache contents.
    pub fn summary(&self) -> SchemaSummary {
        if !self.is_enabled() {
            return SchemaSummary {
                enabled: false,
                message: Some("Schema integration disabled".to_string()),
                tables: 0,
                relationships: 0,
                last_refresh: None,
                cache_valid: false,
            };
        }

        let snapshot = self.snapshot();
        SchemaSummary {
            enabled: true,
            message: None,
            tables: snapshot.as_ref().map_or(0, |s| s.tables().len()),
            relationships: snapshot.as_ref().map_or(0, |s| s.relationships().len()),
            last_refresh: snapshot.as_ref().map(|s| s.loaded_at()),
            cache_valid: !self.is_stale(),
        }
    }

    /// Health report for the schema integration.
    pub fn health(&self) -> SchemaHealth {
        let schema_summary = self.summary();
        let status = if !schema_summary.enabled {
            SchemaHealthStatus::Disabled
        } else if schema_summary.last_refresh.is_some() {
            SchemaHealthStatus::Healthy
        } else {
            SchemaHealthStatus::Degraded
        };
        SchemaHealth {
            status,
            schema_summary,
            refresh_stats: self.stats(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServerError;
    use crate::schema::{GraphRelationship, GraphTable, RelationshipKind, SchemaGraph};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize};

    /// Builder returning a two-table graph, optionally failing on demand.
    struct MockBuilder {
        calls: AtomicUsize,
        fail: AtomicBool,
    }

    impl MockBuilder {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail: AtomicBool::new(false),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SchemaGraphBuilder for MockBuilder {
        async fn build_graph(&self) -> Result<SchemaGraph, ServerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(ServerError::schema("database unreachable"));
            }
            Ok(SchemaGraph {
                tables: vec![
                    GraphTable {
                        name: "users".to_string(),
                        columns: vec!["id".to_string(), "name".to_string()],
                        primary_key: Some("id".to_string()),
                        indexes: vec![],
                        row_count: 10,
                    },
                    GraphTable {
                        name: "orders".to_string(),
                        columns: vec!["id".to_string(), "user_id".to_string()],
                        primary_key: Some("id".to_string()),
                        indexes: vec![],
                        row_count: 5,
                    },
                ],
                relationships: vec![GraphRelationship {
                    from_table: "orders".to_string(),
                    to_table: "users".to_string(),
                    from_column: "user_id".to_string(),
                    to_column: "id".to_string(),
                    kind: RelationshipKind::ForeignKey,
                    confidence: 1.0,
                }],
            })
        }
    }

    #[tokio::test]
    async fn test_disabled_cache_returns_nothing() {
        let cache = SchemaCache::disabled();
        assert!(cache.get_context("Show me all users").await.is_none());
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(cache.get_context("Show me all users").await.is_none());
        assert!(!cache.refresh().await);
        assert_eq!(cache.health().status, SchemaHealthStatus::Disabled);
    }

    #[tokio::test]
    async fn test_cold_cache_loads_on_first_context() {
        let builder = MockBuilder::new();
        let cache = SchemaCache::new(builder.clone(), Duration::from_secs(3600));
        assert!(cache.is_stale());

        let context = cache.get_context("Show me all users").await.unwrap();
        assert_eq!(context.tables[0].name, "users");
        assert_eq!(context.relationships[0].from_table, "orders");
        assert_eq!(builder.calls(), 1);
        assert!(cache.last_refresh().is_some());
    }

    #[tokio::test]
    async fn test_at_most_one_rebuild_within_interval() {
        let builder = MockBuilder::new();
        let cache = SchemaCache::new(builder.clone(), Duration::from_secs(3600));

        cache.get_context("first").await;
        cache.get_context("second").await;
        assert_eq!(builder.calls(), 1);
    }

    #[tokio::test]
    async fn test_refresh_after_interval() {
        let builder = MockBuilder::new();
        let cache = SchemaCache::new(builder.clone(), Duration::from_millis(10));

        cache.get_context("first").await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(cache.is_stale());

        cache.get_context("second").await;
        assert_eq!(builder.calls(), 2);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_snapshot() {
        let builder = MockBuilder::new();
        let cache = SchemaCache::new(builder.clone(), Duration::from_millis(10));

        let first = cache.get_context("first").await.unwrap();
        let loaded_at = cache.last_refresh();

        builder.fail.store(true, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;

        let second = cache.get_context("second").await.unwrap();
        assert_eq!(builder.calls(), 2);
        assert_eq!(first, second);
        assert_eq!(cache.last_refresh(), loaded_at);
        assert_eq!(
            cache.stats(),
            RefreshStats {
                successes: 1,
                failures: 1
            }
        );
    }

    #[tokio::test]
    async fn test_cold_failure_returns_empty_context() {
        let builder = MockBuilder::new();
        builder.fail.store(true, Ordering::SeqCst);
        let cache = SchemaCache::new(builder.clone(), Duration::from_secs(3600));

        let context = cache.get_context("Show me all users").await.unwrap();
        assert!(context.is_empty());
        assert!(cache.snapshot().is_none());
        assert!(cache.last_refresh().is_none());
        assert_eq!(cache.health().status, SchemaHealthStatus::Degraded);

        // Still cold, so the next call tries again
        cache.get_context("again").await;
        assert_eq!(builder.calls(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_stale_readers_rebuild_once() {
        let builder = MockBuilder::new();
        let cache = Arc::new(SchemaCache::new(builder.clone(), Duration::from_secs(3600)));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.get_context(&format!("prompt {i}")).await })
            })
            .collect();
        for handle in handles {
            assert!(handle.await.unwrap().is_some());
        }

        assert_eq!(builder.calls(), 1);
    }

    #[tokio::test]
    async fn test_summary_and_health() {
        let builder = MockBuilder::new();
        let cache = SchemaCache::new(builder, Duration::from_secs(3600));

        let summary = cache.summary();
        assert!(summary.enabled);
        assert_eq!(summary.tables, 0);
        assert!(!summary.cache_valid);

        assert!(cache.refresh().await);
        let health = cache.health();
        assert_eq!(health.status, SchemaHealthStatus::Healthy);
        assert_eq!(health.schema_summary.tables, 2);
        assert_eq!(health.schema_summary.relationships, 1);
        assert!(health.schema_summary.cache_valid);
        assert_eq!(health.refresh_stats.successes, 1);

        let value = serde_json::to_value(&health).unwrap();
        assert_eq!(value["status"], "healthy");
        assert_eq!(value["refresh_stats"]["failures"], 0);
    }
}
