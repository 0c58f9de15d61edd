//! `jive_get_work_item`: get, list (spec §4.4). `get` resolves by id,
//! exact title, or keyword search via `resolve_identifier`; `list`
//! applies simple field filters with pagination over the namespace's
//! full item set.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};

use crate::engine::work_items::resolve_identifier;
use crate::error::ToolError;
use crate::models::{ItemType, Priority, Status, WorkItem};
use crate::store::StoreAdapter;

use super::{action_of, McpTool, ToolContext, ToolOutcome};

pub struct GetWorkItemTool;

#[derive(Debug, Serialize)]
struct ListResult {
    items: Vec<WorkItem>,
    total: usize,
    limit: usize,
    offset: usize,
}

async fn do_get(ctx: &ToolContext, namespace: &str, args: &Value) -> Result<ToolOutcome, ToolError> {
    let id = args
        .get("work_item_id")
        .and_then(Value::as_str)
        .ok_or_else(|| ToolError::validation("work_item_id", "required"))?;
    let store = ctx.stores.get(namespace).await?;
    let item = resolve_identifier(store.as_ref(), id).await?;
    Ok(ToolOutcome::ok(item))
}

async fn do_list(ctx: &ToolContext, namespace: &str, args: &Value) -> Result<ToolOutcome, ToolError> {
    let store = ctx.stores.get(namespace).await?;
    let mut items = store.list_work_items().await?;

    if let Some(t) = args.get("type").and_then(Value::as_str) {
        let item_type: ItemType = t.parse().map_err(|e| ToolError::validation("type", e))?;
        items.retain(|i| i.item_type == item_type);
    }
    if let Some(s) = args.get("status").and_then(Value::as_str) {
        let status: Status = s.parse().map_err(|e| ToolError::validation("status", e))?;
        items.retain(|i| i.status == status);
    }
    if let Some(p) = args.get("priority").and_then(Value::as_str) {
        let priority: Priority = p.parse().map_err(|e| ToolError::validation("priority", e))?;
        items.retain(|i| i.priority == priority);
    }
    if let Some(parent) = args.get("parent_id") {
        let parent = parent.as_str().map(str::to_string);
        items.retain(|i| i.parent_id == parent);
    }
    if let Some(tag) = args.get("tag").and_then(Value::as_str) {
        items.retain(|i| i.tags.iter().any(|t| t == tag));
    }

    items.sort_by(|a, b| a.order_index.cmp(&b.order_index).then_with(|| a.sequence_number.cmp(&b.sequence_number)));

    let total = items.len();
    let limit = args.get("limit").and_then(Value::as_u64).unwrap_or(50).clamp(1, 1000) as usize;
    let offset = args.get("offset").and_then(Value::as_u64).unwrap_or(0) as usize;
    let page: Vec<WorkItem> = items.into_iter().skip(offset).take(limit).collect();

    Ok(ToolOutcome::ok(ListResult { items: page, total, limit, offset }))
}

#[async_trait]
impl McpTool for GetWorkItemTool {
    fn name(&self) -> &'static str {
        "jive_get_work_item"
    }

    fn description(&self) -> &'static str {
        "Retrieve a single work item by id/title/keywords, or list work items with filters and pagination."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "action": { "type": "string", "enum": ["get", "list"] },
                "work_item_id": { "type": "string" },
                "type": { "type": "string", "enum": ["initiative", "epic", "feature", "story", "task"] },
                "status": { "type": "string", "enum": ["not_started", "in_progress", "blocked", "completed", "cancelled"] },
                "priority": { "type": "string", "enum": ["low", "medium", "high", "critical"] },
                "parent_id": { "type": ["string", "null"] },
                "tag": { "type": "string" },
                "limit": { "type": "integer", "minimum": 1, "maximum": 1000, "default": 50 },
                "offset": { "type": "integer", "minimum": 0, "default": 0 }
            },
            "required": ["action"]
        })
    }

    async fn execute(&self, ctx: &ToolContext, namespace: &str, args: Value) -> ToolOutcome {
        let result = async {
            match action_of(&args)?.as_str() {
                "get" => do_get(ctx, namespace, &args).await,
                "list" => do_list(ctx, namespace, &args).await,
                other => Err(ToolError::InvalidAction(other.to_string())),
            }
        }
        .await;
        result.unwrap_or_else(|e| ToolOutcome::from_error(&e))
    }
}
