//! Execution tracking for the `jive_execute_work_item` tool (spec
//! §4.7), wrapping [`ExecutionRecord`] transitions with store
//! persistence. Grounded on
//! `original_source/src/mcp_jive/tools/consolidated/unified_progress_tool.py`,
//! whose `execute`/`status`/`cancel` actions this module mirrors.

use crate::error::ToolError;
use crate::models::{ExecutionEvent, ExecutionRecord, ExecutionStatus, Status, WorkItem};
use crate::store::StoreAdapter;

/// Start executing a work item (spec §4.7 `execute` action): creates a
/// `pending` record, immediately transitions it to `running`, and marks
/// the item `in_progress` if it was `not_started`.
pub async fn start(
    store: &dyn StoreAdapter,
    work_item_id: &str,
    agent_id: Option<String>,
) -> Result<ExecutionRecord, ToolError> {
    let mut item = store
        .get_work_item(work_item_id)
        .await?
        .ok_or_else(|| ToolError::WorkItemNotFound(work_item_id.to_string()))?;

    let mut record = ExecutionRecord::new(Some(work_item_id.to_string()), "execute", agent_id);
    if !record.transition(ExecutionEvent::Start) {
        return Err(ToolError::internal("freshly created execution record refused Start"));
    }
    store.add_execution(&record).await?;

    if item.status == Status::NotStarted {
        item.apply_status(Status::InProgress);
        item.updated_at = chrono::Utc::now();
        store.delete_work_item(work_item_id).await?;
        store.add_work_item(&item).await?;
    }

    Ok(record)
}

async fn finish(
    store: &dyn StoreAdapter,
    execution_id: &str,
    event: ExecutionEvent,
    error_message: Option<String>,
) -> Result<ExecutionRecord, ToolError> {
    let mut record = store
        .get_execution(execution_id)
        .await?
        .ok_or_else(|| ToolError::internal(format!("execution record '{execution_id}' not found")))?;

    if !record.transition(event) {
        return Err(ToolError::InvalidAction(format!(
            "cannot apply {event:?} to execution in state {:?}",
            record.status
        )));
    }
    record.error_message = error_message;
    store.update_execution(&record).await?;

    if let Some(work_item_id) = &record.work_item_id {
        if let Some(mut item) = store.get_work_item(work_item_id).await? {
            match record.status {
                ExecutionStatus::Succeeded => {
                    item.apply_status(Status::Completed);
                }
                ExecutionStatus::Failed => {
                    item.apply_status(Status::Blocked);
                }
                ExecutionStatus::Cancelled => {
                    item.apply_status(Status::NotStarted);
                }
                _ => {}
            }
            item.updated_at = chrono::Utc::now();
            store.delete_work_item(work_item_id).await?;
            store.add_work_item(&item).await?;
        }
    }

    Ok(record)
}

pub async fn complete(store: &dyn StoreAdapter, execution_id: &str) -> Result<ExecutionRecord, ToolError> {
    finish(store, execution_id, ExecutionEvent::Complete, None).await
}

pub async fn fail(
    store: &dyn StoreAdapter,
    execution_id: &str,
    error_message: String,
) -> Result<ExecutionRecord, ToolError> {
    finish(store, execution_id, ExecutionEvent::Fail, Some(error_message)).await
}

pub async fn cancel(store: &dyn StoreAdapter, execution_id: &str) -> Result<ExecutionRecord, ToolError> {
    finish(store, execution_id, ExecutionEvent::Cancel, None).await
}

pub async fn status(store: &dyn StoreAdapter, execution_id: &str) -> Result<ExecutionRecord, ToolError> {
    store
        .get_execution(execution_id)
        .await?
        .ok_or_else(|| ToolError::internal(format!("execution record '{execution_id}' not found")))
}

pub async fn history(store: &dyn StoreAdapter, work_item_id: &str) -> Result<Vec<ExecutionRecord>, ToolError> {
    Ok(store.list_executions(Some(work_item_id)).await?)
}

/// Validates that an item's prerequisites are satisfied before it can
/// be executed (spec §4.7 `validate` action): all of its dependencies
/// must be `completed`.
pub async fn validate_ready(store: &dyn StoreAdapter, work_item_id: &str) -> Result<Vec<WorkItem>, ToolError> {
    let item = store
        .get_work_item(work_item_id)
        .await?
        .ok_or_else(|| ToolError::WorkItemNotFound(work_item_id.to_string()))?;
    let mut blocking = Vec::new();
    for dep_id in &item.dependencies {
        if let Some(dep) = store.get_work_item(dep_id).await? {
            if dep.status != Status::Completed {
                blocking.push(dep);
            }
        }
    }
    Ok(blocking)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ItemType, WorkItem as Item};
    use crate::store::sqlite::SqliteStore;

    async fn store() -> (SqliteStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(dir.path()).unwrap();
        store.ensure_fts_index().await.unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn start_marks_item_in_progress() {
        let (store, _dir) = store().await;
        let item = Item::new(ItemType::Task, "T".into(), String::new());
        store.add_work_item(&item).await.unwrap();

        let record = start(&store, &item.id, None).await.unwrap();
        assert_eq!(record.status, ExecutionStatus::Running);
        let refreshed = store.get_work_item(&item.id).await.unwrap().unwrap();
        assert_eq!(refreshed.status, Status::InProgress);
    }

    #[tokio::test]
    async fn complete_marks_item_completed() {
        let (store, _dir) = store().await;
        let item = Item::new(ItemType::Task, "T".into(), String::new());
        store.add_work_item(&item).await.unwrap();
        let record = start(&store, &item.id, None).await.unwrap();
        complete(&store, &record.id).await.unwrap();
        let refreshed = store.get_work_item(&item.id).await.unwrap().unwrap();
        assert_eq!(refreshed.status, Status::Completed);
        assert_eq!(refreshed.progress_percentage, 100.0);
    }

    #[tokio::test]
    async fn validate_ready_lists_incomplete_dependencies() {
        let (store, _dir) = store().await;
        let dep = Item::new(ItemType::Task, "dep".into(), String::new());
        store.add_work_item(&dep).await.unwrap();
        let mut item = Item::new(ItemType::Task, "T".into(), String::new());
        item.dependencies.push(dep.id.clone());
        store.add_work_item(&item).await.unwrap();

        let blocking = validate_ready(&store, &item.id).await.unwrap();
        assert_eq!(blocking.len(), 1);
        assert_eq!(blocking[0].id, dep.id);
    }
}
