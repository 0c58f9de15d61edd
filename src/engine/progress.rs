//! Progress tracking and rollup (spec §4.7). Grounded on
//! `original_source/src/mcp_jive/tools/consolidated/unified_progress_tool.py`.
//!
//! Rollup formula (Open Question, recorded in DESIGN.md): a parent's
//! progress is the unweighted mean of its direct children's
//! `progress_percentage`, with completed children counted as 100 and
//! cancelled children excluded from the average entirely. Rollup is
//! computed lazily, one level at a time, rather than cached.

use chrono::Utc;
use serde::Serialize;

use crate::error::ToolError;
use crate::models::{ExecutionRecord, Status, WorkItem};
use crate::store::StoreAdapter;

/// Record a progress update on a single item (spec §4.7 `track`
/// action), auto-deriving status unless the caller already set one
/// explicitly via the `manage` tool.
pub async fn track(
    store: &dyn StoreAdapter,
    id: &str,
    progress_percentage: f64,
    notes: Option<String>,
) -> Result<WorkItem, ToolError> {
    let mut item = store.get_work_item(id).await?.ok_or_else(|| ToolError::WorkItemNotFound(id.to_string()))?;
    item.apply_progress(progress_percentage, true);
    item.updated_at = Utc::now();
    store.delete_work_item(id).await?;
    store.add_work_item(&item).await?;

    let mut record = ExecutionRecord::new(Some(id.to_string()), "progress_update".to_string(), None);
    record.status = crate::models::ExecutionStatus::Succeeded;
    record.details = notes.map(|n| serde_json::json!({ "notes": n, "progress_percentage": progress_percentage }));
    store.add_execution(&record).await?;

    Ok(item)
}

/// Recompute a parent's `progress_percentage` from its direct children
/// and persist it (does not recurse further up; callers walk the
/// ancestor chain themselves when a multi-level rollup is needed).
pub async fn rollup_once(store: &dyn StoreAdapter, parent_id: &str) -> Result<WorkItem, ToolError> {
    let children = super::work_items::children(store, parent_id).await?;
    let mut parent =
        store.get_work_item(parent_id).await?.ok_or_else(|| ToolError::WorkItemNotFound(parent_id.to_string()))?;

    let counted: Vec<f64> = children
        .iter()
        .filter(|c| c.status != Status::Cancelled)
        .map(|c| if c.status == Status::Completed { 100.0 } else { c.progress_percentage })
        .collect();

    if !counted.is_empty() {
        let mean = counted.iter().sum::<f64>() / counted.len() as f64;
        parent.apply_progress(mean, true);
        parent.updated_at = Utc::now();
        store.delete_work_item(parent_id).await?;
        store.add_work_item(&parent).await?;
    }
    Ok(parent)
}

/// Rolls progress up the full ancestor chain, one level at a time.
pub async fn rollup_ancestors(store: &dyn StoreAdapter, id: &str) -> Result<(), ToolError> {
    let chain = super::work_items::parents(store, id).await?;
    for ancestor in chain {
        rollup_once(store, &ancestor.id).await?;
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgressReport {
    pub work_item_id: String,
    pub progress_percentage: f64,
    pub status: Status,
    pub children_total: usize,
    pub children_completed: usize,
}

pub async fn report(store: &dyn StoreAdapter, id: &str) -> Result<ProgressReport, ToolError> {
    let item = store.get_work_item(id).await?.ok_or_else(|| ToolError::WorkItemNotFound(id.to_string()))?;
    let children = super::work_items::children(store, id).await?;
    let completed = children.iter().filter(|c| c.status == Status::Completed).count();
    Ok(ProgressReport {
        work_item_id: item.id.clone(),
        progress_percentage: item.progress_percentage,
        status: item.status,
        children_total: children.len(),
        children_completed: completed,
    })
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Analytics {
    pub total_items: usize,
    pub completed_items: usize,
    pub in_progress_items: usize,
    pub blocked_items: usize,
    pub completion_rate: f64,
    /// Items whose dependencies are not all completed but whose own
    /// status is not `not_started` (spec §4.7 "bottlenecks": in-flight
    /// work stalled behind an incomplete dependency).
    pub bottlenecks: Vec<String>,
}

/// Whole-namespace analytics (spec §4.7 `analytics` action): velocity,
/// completion rate, and bottleneck detection. Velocity/burndown/trend
/// windows need historical snapshots this server does not retain
/// (spec §9 Non-goal: no time-series metrics store), so this reports
/// the point-in-time figures the current table state can support.
pub async fn analytics(store: &dyn StoreAdapter) -> Result<Analytics, ToolError> {
    let all = store.list_work_items().await?;
    let total_items = all.len();
    let completed_items = all.iter().filter(|i| i.status == Status::Completed).count();
    let in_progress_items = all.iter().filter(|i| i.status == Status::InProgress).count();
    let blocked_items = all.iter().filter(|i| i.status == Status::Blocked).count();

    let by_id: std::collections::HashMap<&str, &WorkItem> = all.iter().map(|i| (i.id.as_str(), i)).collect();
    let bottlenecks: Vec<String> = all
        .iter()
        .filter(|item| {
            item.status != Status::NotStarted
                && item.status != Status::Completed
                && item
                    .dependencies
                    .iter()
                    .any(|d| by_id.get(d.as_str()).is_some_and(|dep| dep.status != Status::Completed))
        })
        .map(|i| i.id.clone())
        .collect();

    let completion_rate = if total_items == 0 { 0.0 } else { completed_items as f64 / total_items as f64 * 100.0 };

    Ok(Analytics { total_items, completed_items, in_progress_items, blocked_items, completion_rate, bottlenecks })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::work_items::{create, NewWorkItem};
    use crate::models::{ItemType, Priority};
    use crate::store::sqlite::SqliteStore;

    async fn store() -> (SqliteStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(dir.path()).unwrap();
        store.ensure_fts_index().await.unwrap();
        (store, dir)
    }

    fn new_item(item_type: ItemType, title: &str, parent_id: Option<String>) -> NewWorkItem {
        NewWorkItem {
            item_type,
            title: title.to_string(),
            description: String::new(),
            parent_id,
            priority: Priority::Medium,
            tags: Vec::new(),
            acceptance_criteria: Vec::new(),
            dependencies: Vec::new(),
            metadata: "{}".to_string(),
        }
    }

    #[tokio::test]
    async fn rollup_averages_children_excluding_cancelled() {
        let (store, _dir) = store().await;
        let parent = create(&store, "local-hash-384", new_item(ItemType::Epic, "P", None)).await.unwrap();
        let a = create(&store, "local-hash-384", new_item(ItemType::Feature, "A", Some(parent.id.clone())))
            .await
            .unwrap();
        let b = create(&store, "local-hash-384", new_item(ItemType::Feature, "B", Some(parent.id.clone())))
            .await
            .unwrap();
        let c = create(&store, "local-hash-384", new_item(ItemType::Feature, "C", Some(parent.id.clone())))
            .await
            .unwrap();

        track(&store, &a.id, 50.0, None).await.unwrap();
        track(&store, &b.id, 100.0, None).await.unwrap();

        let mut cancelled = store.get_work_item(&c.id).await.unwrap().unwrap();
        cancelled.status = Status::Cancelled;
        store.delete_work_item(&c.id).await.unwrap();
        store.add_work_item(&cancelled).await.unwrap();

        let updated = rollup_once(&store, &parent.id).await.unwrap();
        assert_eq!(updated.progress_percentage, 75.0);
    }

    #[tokio::test]
    async fn analytics_detects_bottleneck() {
        let (store, _dir) = store().await;
        let blocker = create(&store, "local-hash-384", new_item(ItemType::Task, "blocker", None)).await.unwrap();
        let blocked = create(&store, "local-hash-384", new_item(ItemType::Task, "blocked", None)).await.unwrap();
        crate::engine::work_items::add_dependency(&store, &blocked.id, &blocker.id).await.unwrap();
        track(&store, &blocked.id, 10.0, None).await.unwrap();

        let stats = analytics(&store).await.unwrap();
        assert!(stats.bottlenecks.contains(&blocked.id));
    }
}
