//! Concrete [`StoreAdapter`] backed by `rusqlite` + `r2d2`: one SQLite file
//! per namespace, an `fts5` virtual table for keyword search, vectors
//! stored as serialized `f32` blobs scored by brute-force cosine
//! similarity (spec §6.2, §9 — grounded on `other_examples`'
//! `kotadb-kota-db`, an embedded store that also hand-rolls its vector
//! index rather than depending on an external vector-database crate).

use std::path::Path;

use async_trait::async_trait;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};

use super::{StoreAdapter, StoreError, TableStats};
use crate::embedding::cosine_distance;
use crate::models::{ExecutionRecord, ExecutionStatus, ItemType, Priority, Status, WorkItem};

type Pool = r2d2::Pool<SqliteConnectionManager>;

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS work_items (
    id TEXT PRIMARY KEY,
    item_type TEXT NOT NULL,
    title TEXT NOT NULL,
    description TEXT NOT NULL,
    status TEXT NOT NULL,
    priority TEXT NOT NULL,
    progress_percentage REAL NOT NULL,
    parent_id TEXT,
    dependencies TEXT NOT NULL,
    sequence_number TEXT NOT NULL,
    order_index INTEGER NOT NULL,
    tags TEXT NOT NULL,
    acceptance_criteria TEXT NOT NULL,
    vector BLOB NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    completed_at TEXT,
    metadata TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_work_items_parent ON work_items(parent_id);

CREATE TABLE IF NOT EXISTS execution_log (
    id TEXT PRIMARY KEY,
    work_item_id TEXT,
    action TEXT NOT NULL,
    status TEXT NOT NULL,
    agent_id TEXT,
    details TEXT,
    error_message TEXT,
    duration_seconds REAL,
    timestamp TEXT NOT NULL,
    metadata TEXT
);
CREATE INDEX IF NOT EXISTS idx_execution_log_work_item ON execution_log(work_item_id);
";

const FTS_SCHEMA: &str = r"
CREATE VIRTUAL TABLE IF NOT EXISTS work_items_fts USING fts5(
    id UNINDEXED,
    title,
    description,
    acceptance_criteria,
    status,
    priority,
    item_type
);
";

/// One embedded SQLite-backed store per namespace.
pub struct SqliteStore {
    pool: Pool,
}

impl SqliteStore {
    /// Open (creating if missing) the store rooted at `dir`.
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(dir).map_err(|e| StoreError::Sqlite(e.to_string()))?;
        let db_path = dir.join("jive.db");
        let manager = SqliteConnectionManager::file(db_path).with_init(|c| {
            c.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
        });
        let pool = r2d2::Pool::builder()
            .max_size(8)
            .build(manager)
            .map_err(|e| StoreError::Pool(e.to_string()))?;
        {
            let conn = pool.get().map_err(|e| StoreError::Pool(e.to_string()))?;
            conn.execute_batch(SCHEMA).map_err(|e| StoreError::Sqlite(e.to_string()))?;
        }
        Ok(Self { pool })
    }

    fn conn(&self) -> Result<r2d2::PooledConnection<SqliteConnectionManager>, StoreError> {
        self.pool.get().map_err(|e| StoreError::Pool(e.to_string()))
    }
}

fn encode_vector(v: &[f32]) -> Vec<u8> {
    v.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn decode_vector(bytes: &[u8]) -> Vec<f32> {
    bytes.chunks_exact(4).map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]])).collect()
}

fn encode_json<T: serde::Serialize>(value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|e| StoreError::Serde(e.to_string()))
}

fn decode_json<T: serde::de::DeserializeOwned>(s: &str) -> Result<T, StoreError> {
    serde_json::from_str(s).map_err(|e| StoreError::Serde(e.to_string()))
}

fn row_to_work_item(row: &rusqlite::Row<'_>) -> rusqlite::Result<WorkItem> {
    let item_type: String = row.get("item_type")?;
    let status: String = row.get("status")?;
    let priority: String = row.get("priority")?;
    let dependencies: String = row.get("dependencies")?;
    let tags: String = row.get("tags")?;
    let acceptance_criteria: String = row.get("acceptance_criteria")?;
    let vector: Vec<u8> = row.get("vector")?;

    Ok(WorkItem {
        id: row.get("id")?,
        item_type: item_type.parse::<ItemType>().unwrap_or(ItemType::Task),
        title: row.get("title")?,
        description: row.get("description")?,
        status: status.parse::<Status>().unwrap_or_default(),
        priority: priority.parse::<Priority>().unwrap_or_default(),
        progress_percentage: row.get("progress_percentage")?,
        parent_id: row.get("parent_id")?,
        dependencies: decode_json(&dependencies).unwrap_or_default(),
        sequence_number: row.get("sequence_number")?,
        order_index: row.get("order_index")?,
        tags: decode_json(&tags).unwrap_or_default(),
        acceptance_criteria: decode_json(&acceptance_criteria).unwrap_or_default(),
        vector: decode_vector(&vector),
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        completed_at: row.get("completed_at")?,
        metadata: row.get("metadata")?,
    })
}

fn row_to_execution(row: &rusqlite::Row<'_>) -> rusqlite::Result<ExecutionRecord> {
    let status: String = row.get("status")?;
    let details: Option<String> = row.get("details")?;
    let metadata: Option<String> = row.get("metadata")?;

    Ok(ExecutionRecord {
        id: row.get("id")?,
        work_item_id: row.get("work_item_id")?,
        action: row.get("action")?,
        status: status.parse::<ExecutionStatus>().unwrap_or(ExecutionStatus::Pending),
        agent_id: row.get("agent_id")?,
        details: details.and_then(|d| serde_json::from_str(&d).ok()),
        error_message: row.get("error_message")?,
        duration_seconds: row.get("duration_seconds")?,
        timestamp: row.get("timestamp")?,
        metadata: metadata.and_then(|m| serde_json::from_str(&m).ok()),
    })
}

/// Builds an FTS5 `MATCH` expression that ORs together quoted terms, so a
/// hit on any term scores (the ranking layer weighs term hits itself;
/// spec §4.6.3).
fn fts_match_expr(text: &str) -> String {
    text.split_whitespace()
        .filter(|t| !t.is_empty())
        .map(|t| format!("\"{}\"", t.replace('"', "")))
        .collect::<Vec<_>>()
        .join(" OR ")
}

#[async_trait]
impl StoreAdapter for SqliteStore {
    async fn ensure_fts_index(&self) -> Result<(), StoreError> {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get().map_err(|e| StoreError::Pool(e.to_string()))?;
            conn.execute_batch(FTS_SCHEMA).map_err(|e| StoreError::Sqlite(e.to_string()))
        })
        .await
        .map_err(|e| StoreError::Sqlite(e.to_string()))?
    }

    async fn add_work_item(&self, item: &WorkItem) -> Result<(), StoreError> {
        let item = item.clone();
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get().map_err(|e| StoreError::Pool(e.to_string()))?;
            conn.execute(
                "INSERT INTO work_items (id, item_type, title, description, status, priority, \
                 progress_percentage, parent_id, dependencies, sequence_number, order_index, \
                 tags, acceptance_criteria, vector, created_at, updated_at, completed_at, metadata) \
                 VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18)",
                params![
                    item.id,
                    item.item_type.as_str(),
                    item.title,
                    item.description,
                    item.status.as_str(),
                    item.priority.as_str(),
                    item.progress_percentage,
                    item.parent_id,
                    encode_json(&item.dependencies)?,
                    item.sequence_number,
                    item.order_index,
                    encode_json(&item.tags)?,
                    encode_json(&item.acceptance_criteria)?,
                    encode_vector(&item.vector),
                    item.created_at,
                    item.updated_at,
                    item.completed_at,
                    item.metadata,
                ],
            )
            .map_err(|e| StoreError::Sqlite(e.to_string()))?;

            conn.execute(
                "INSERT INTO work_items_fts (id, title, description, acceptance_criteria, \
                 status, priority, item_type) VALUES (?1,?2,?3,?4,?5,?6,?7)",
                params![
                    item.id,
                    item.title,
                    item.description,
                    item.acceptance_criteria.join(" "),
                    item.status.as_str(),
                    item.priority.as_str(),
                    item.item_type.as_str(),
                ],
            )
            .map_err(|e| StoreError::Sqlite(e.to_string()))?;
            Ok(())
        })
        .await
        .map_err(|e| StoreError::Sqlite(e.to_string()))?
    }

    async fn delete_work_item(&self, id: &str) -> Result<bool, StoreError> {
        let id = id.to_string();
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get().map_err(|e| StoreError::Pool(e.to_string()))?;
            let affected = conn
                .execute("DELETE FROM work_items WHERE id = ?1", params![id])
                .map_err(|e| StoreError::Sqlite(e.to_string()))?;
            conn.execute("DELETE FROM work_items_fts WHERE id = ?1", params![id])
                .map_err(|e| StoreError::Sqlite(e.to_string()))?;
            Ok(affected > 0)
        })
        .await
        .map_err(|e| StoreError::Sqlite(e.to_string()))?
    }

    async fn get_work_item(&self, id: &str) -> Result<Option<WorkItem>, StoreError> {
        let id = id.to_string();
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get().map_err(|e| StoreError::Pool(e.to_string()))?;
            conn.query_row("SELECT * FROM work_items WHERE id = ?1", params![id], row_to_work_item)
                .optional()
                .map_err(|e| StoreError::Sqlite(e.to_string()))
        })
        .await
        .map_err(|e| StoreError::Sqlite(e.to_string()))?
    }

    async fn list_work_items(&self) -> Result<Vec<WorkItem>, StoreError> {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get().map_err(|e| StoreError::Pool(e.to_string()))?;
            let mut stmt = conn
                .prepare("SELECT * FROM work_items")
                .map_err(|e| StoreError::Sqlite(e.to_string()))?;
            let rows = stmt
                .query_map([], row_to_work_item)
                .map_err(|e| StoreError::Sqlite(e.to_string()))?;
            let mut items = Vec::new();
            for row in rows {
                items.push(row.map_err(|e| StoreError::Sqlite(e.to_string()))?);
            }
            Ok(items)
        })
        .await
        .map_err(|e| StoreError::Sqlite(e.to_string()))?
    }

    async fn count_work_items(&self) -> Result<u64, StoreError> {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get().map_err(|e| StoreError::Pool(e.to_string()))?;
            conn.query_row("SELECT COUNT(*) FROM work_items", [], |r| r.get::<_, i64>(0))
                .map(|n| n as u64)
                .map_err(|e| StoreError::Sqlite(e.to_string()))
        })
        .await
        .map_err(|e| StoreError::Sqlite(e.to_string()))?
    }

    async fn vector_search_work_items(
        &self,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<(WorkItem, f32)>, StoreError> {
        let items = self.list_work_items().await?;
        let mut scored: Vec<(WorkItem, f32)> = items
            .into_iter()
            .map(|item| {
                let distance = cosine_distance(query_vector, &item.vector);
                (item, distance)
            })
            .collect();
        scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        Ok(scored)
    }

    async fn fts_search_work_items(
        &self,
        text: &str,
        limit: usize,
    ) -> Result<Vec<(WorkItem, f64)>, StoreError> {
        let match_expr = fts_match_expr(text);
        if match_expr.is_empty() {
            return Ok(Vec::new());
        }
        let pool = self.pool.clone();
        let limit = limit as i64;
        tokio::task::spawn_blocking(move || {
            let conn = pool.get().map_err(|e| StoreError::Pool(e.to_string()))?;
            let mut stmt = conn
                .prepare(
                    "SELECT w.*, bm25(work_items_fts) AS rank FROM work_items_fts \
                     JOIN work_items w ON w.id = work_items_fts.id \
                     WHERE work_items_fts MATCH ?1 ORDER BY rank LIMIT ?2",
                )
                .map_err(|e| StoreError::Sqlite(e.to_string()))?;
            let rows = stmt
                .query_map(params![match_expr, limit], |row| {
                    let item = row_to_work_item(row)?;
                    let rank: f64 = row.get("rank")?;
                    // bm25() is negative-is-better; invert to a positive score.
                    Ok((item, -rank))
                })
                .map_err(|e| StoreError::Sqlite(e.to_string()))?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row.map_err(|e| StoreError::Sqlite(e.to_string()))?);
            }
            Ok(out)
        })
        .await
        .map_err(|e| StoreError::Sqlite(e.to_string()))?
    }

    async fn add_execution(&self, record: &ExecutionRecord) -> Result<(), StoreError> {
        let record = record.clone();
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get().map_err(|e| StoreError::Pool(e.to_string()))?;
            insert_execution(&conn, &record)
        })
        .await
        .map_err(|e| StoreError::Sqlite(e.to_string()))?
    }

    async fn update_execution(&self, record: &ExecutionRecord) -> Result<(), StoreError> {
        let record = record.clone();
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get().map_err(|e| StoreError::Pool(e.to_string()))?;
            conn.execute("DELETE FROM execution_log WHERE id = ?1", params![record.id])
                .map_err(|e| StoreError::Sqlite(e.to_string()))?;
            insert_execution(&conn, &record)
        })
        .await
        .map_err(|e| StoreError::Sqlite(e.to_string()))?
    }

    async fn get_execution(&self, id: &str) -> Result<Option<ExecutionRecord>, StoreError> {
        let id = id.to_string();
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get().map_err(|e| StoreError::Pool(e.to_string()))?;
            conn.query_row(
                "SELECT * FROM execution_log WHERE id = ?1",
                params![id],
                row_to_execution,
            )
            .optional()
            .map_err(|e| StoreError::Sqlite(e.to_string()))
        })
        .await
        .map_err(|e| StoreError::Sqlite(e.to_string()))?
    }

    async fn list_executions(
        &self,
        work_item_id: Option<&str>,
    ) -> Result<Vec<ExecutionRecord>, StoreError> {
        let work_item_id = work_item_id.map(ToString::to_string);
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get().map_err(|e| StoreError::Pool(e.to_string()))?;
            let (sql, has_filter) = match &work_item_id {
                Some(_) => ("SELECT * FROM execution_log WHERE work_item_id = ?1 ORDER BY timestamp", true),
                None => ("SELECT * FROM execution_log ORDER BY timestamp", false),
            };
            let mut stmt = conn.prepare(sql).map_err(|e| StoreError::Sqlite(e.to_string()))?;
            let rows = if has_filter {
                stmt.query_map(params![work_item_id], row_to_execution)
            } else {
                stmt.query_map([], row_to_execution)
            }
            .map_err(|e| StoreError::Sqlite(e.to_string()))?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row.map_err(|e| StoreError::Sqlite(e.to_string()))?);
            }
            Ok(out)
        })
        .await
        .map_err(|e| StoreError::Sqlite(e.to_string()))?
    }

    async fn stats(&self) -> Result<TableStats, StoreError> {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get().map_err(|e| StoreError::Pool(e.to_string()))?;
            let work_item_count: i64 = conn
                .query_row("SELECT COUNT(*) FROM work_items", [], |r| r.get(0))
                .map_err(|e| StoreError::Sqlite(e.to_string()))?;
            let execution_log_count: i64 = conn
                .query_row("SELECT COUNT(*) FROM execution_log", [], |r| r.get(0))
                .map_err(|e| StoreError::Sqlite(e.to_string()))?;
            Ok(TableStats {
                work_item_count: work_item_count as u64,
                execution_log_count: execution_log_count as u64,
            })
        })
        .await
        .map_err(|e| StoreError::Sqlite(e.to_string()))?
    }
}

fn insert_execution(conn: &rusqlite::Connection, record: &ExecutionRecord) -> Result<(), StoreError> {
    let details = record
        .details
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| StoreError::Serde(e.to_string()))?;
    let metadata = record
        .metadata
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| StoreError::Serde(e.to_string()))?;
    conn.execute(
        "INSERT INTO execution_log (id, work_item_id, action, status, agent_id, details, \
         error_message, duration_seconds, timestamp, metadata) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10)",
        params![
            record.id,
            record.work_item_id,
            record.action,
            record.status.as_str(),
            record.agent_id,
            details,
            record.error_message,
            record.duration_seconds,
            record.timestamp,
            metadata,
        ],
    )
    .map_err(|e| StoreError::Sqlite(e.to_string()))?;
    Ok(())
}

/// Retries a write with exponential backoff (spec §5: "optimistic retry
/// with exponential backoff, max 3 attempts").
pub async fn with_retry<F, Fut, T>(mut op: F) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, StoreError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if attempt < 2 => {
                attempt += 1;
                let backoff = std::time::Duration::from_millis(50 * 2u64.pow(attempt));
                tracing::warn!(attempt, error = %e, "store write conflict, retrying");
                tokio::time::sleep(backoff).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WorkItem;

    async fn store() -> (SqliteStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(dir.path()).unwrap();
        store.ensure_fts_index().await.unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn insert_and_get_round_trip() {
        let (store, _dir) = store().await;
        let mut item = WorkItem::new(ItemType::Initiative, "A".into(), "desc".into());
        item.sequence_number = "1".into();
        item.order_index = 1;
        item.vector = vec![1.0, 0.0, 0.0];
        store.add_work_item(&item).await.unwrap();

        let fetched = store.get_work_item(&item.id).await.unwrap().unwrap();
        assert_eq!(fetched.title, "A");
        assert_eq!(fetched.vector, vec![1.0, 0.0, 0.0]);
    }

    #[tokio::test]
    async fn delete_removes_from_fts_too() {
        let (store, _dir) = store().await;
        let item = WorkItem::new(ItemType::Task, "searchable term".into(), String::new());
        store.add_work_item(&item).await.unwrap();
        assert!(store.delete_work_item(&item.id).await.unwrap());
        let hits = store.fts_search_work_items("searchable", 10).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn fts_search_finds_title_term() {
        let (store, _dir) = store().await;
        let item = WorkItem::new(ItemType::Task, "rebuild the parser".into(), "irrelevant".into());
        store.add_work_item(&item).await.unwrap();
        let hits = store.fts_search_work_items("parser", 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0.id, item.id);
    }

    #[tokio::test]
    async fn vector_search_ranks_by_cosine_distance() {
        let (store, _dir) = store().await;
        let mut near = WorkItem::new(ItemType::Task, "near".into(), String::new());
        near.vector = vec![1.0, 0.0];
        let mut far = WorkItem::new(ItemType::Task, "far".into(), String::new());
        far.vector = vec![0.0, 1.0];
        store.add_work_item(&near).await.unwrap();
        store.add_work_item(&far).await.unwrap();

        let hits = store.vector_search_work_items(&[1.0, 0.0], 2).await.unwrap();
        assert_eq!(hits[0].0.id, near.id);
        assert!(hits[0].1 < hits[1].1);
    }
}
