//! Store adapter (spec §6.2): the embedded vector/table store the
//! work-item and search engines sit on top of. Out of scope for this spec
//! at the level of "which vector database", but its contract — typed
//! tables, vector search, full-text search, delete-then-reinsert updates —
//! is in scope and implemented here against `rusqlite`.
//!
//! One [`SqliteStore`] is opened per namespace (spec P5 isolation); a
//! [`StoreRegistry`] owns the pool of open stores, lazily opening one per
//! namespace the first time it is referenced.

pub mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{ExecutionRecord, WorkItem};

#[derive(Error, Debug, Clone)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(String),
    #[error("pool error: {0}")]
    Pool(String),
    #[error("serialization error: {0}")]
    Serde(String),
    #[error("write conflict on '{0}' after retries exhausted")]
    WriteConflict(String),
}

/// Aggregate per-table counts (spec §4.8 `stats`).
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct TableStats {
    pub work_item_count: u64,
    pub execution_log_count: u64,
}

/// Contract consumed by the work-item and search engines (spec §6.2),
/// specialized from the spec's generic `add`/`delete`/`search`/`where`
/// table operations down to the two concrete tables (`work_item`,
/// `execution_log`) this server actually uses — the two "memory" tables
/// named in spec §9 are not wired to any tool and have no trait methods.
#[async_trait]
pub trait StoreAdapter: Send + Sync {
    /// Idempotent: builds the FTS index for `work_item` over the field set
    /// spec §4.6.2 names (title, description, acceptance_criteria, status,
    /// priority, item_type) if it does not already exist.
    async fn ensure_fts_index(&self) -> Result<(), StoreError>;

    async fn add_work_item(&self, item: &WorkItem) -> Result<(), StoreError>;
    async fn delete_work_item(&self, id: &str) -> Result<bool, StoreError>;
    async fn get_work_item(&self, id: &str) -> Result<Option<WorkItem>, StoreError>;
    async fn list_work_items(&self) -> Result<Vec<WorkItem>, StoreError>;
    async fn count_work_items(&self) -> Result<u64, StoreError>;

    /// Brute-force cosine nearest-neighbour search (spec §4.6.2, §9: no
    /// native ANN index at this scale).
    async fn vector_search_work_items(
        &self,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<(WorkItem, f32)>, StoreError>;

    /// Full-text search via the `fts5` index when present; the search
    /// engine falls back to substring scanning over `list_work_items` when
    /// this returns an empty result and the caller detects the index is
    /// absent.
    async fn fts_search_work_items(
        &self,
        text: &str,
        limit: usize,
    ) -> Result<Vec<(WorkItem, f64)>, StoreError>;

    async fn add_execution(&self, record: &ExecutionRecord) -> Result<(), StoreError>;
    /// Store has no in-place update (spec §4.5.2); this deletes and
    /// reinserts the row.
    async fn update_execution(&self, record: &ExecutionRecord) -> Result<(), StoreError>;
    async fn get_execution(&self, id: &str) -> Result<Option<ExecutionRecord>, StoreError>;
    async fn list_executions(
        &self,
        work_item_id: Option<&str>,
    ) -> Result<Vec<ExecutionRecord>, StoreError>;

    async fn stats(&self) -> Result<TableStats, StoreError>;
}

/// Opens and caches one [`SqliteStore`] per namespace.
pub struct StoreRegistry {
    namespaces: Arc<crate::namespace::NamespaceManager>,
    open: tokio::sync::RwLock<std::collections::HashMap<String, Arc<sqlite::SqliteStore>>>,
}

impl StoreRegistry {
    #[must_use]
    pub fn new(namespaces: Arc<crate::namespace::NamespaceManager>) -> Self {
        Self { namespaces, open: tokio::sync::RwLock::new(std::collections::HashMap::new()) }
    }

    /// Get (opening if necessary) the store for `namespace`.
    pub async fn get(&self, namespace: &str) -> Result<Arc<sqlite::SqliteStore>, StoreError> {
        if let Some(store) = self.open.read().await.get(namespace) {
            return Ok(Arc::clone(store));
        }
        let mut guard = self.open.write().await;
        if let Some(store) = guard.get(namespace) {
            return Ok(Arc::clone(store));
        }
        let root = self.namespaces.path(namespace);
        let store = Arc::new(sqlite::SqliteStore::open(&root)?);
        store.ensure_fts_index().await?;
        guard.insert(namespace.to_string(), Arc::clone(&store));
        Ok(store)
    }

    /// Drop the cached handle for a deleted namespace, if any (closes the
    /// pool before the directory tree is removed).
    pub async fn evict(&self, namespace: &str) {
        self.open.write().await.remove(namespace);
    }
}
