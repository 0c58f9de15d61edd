//! `jive_manage_work_item`: create, update, delete (spec §4.4). Grounded
//! on `original_source/src/mcp_jive/tools/consolidated/unified_work_item_tool.py`.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::engine::work_items::{self, NewWorkItem, UpdatePatch};
use crate::error::ToolError;
use crate::models::{ItemType, Priority, Status};

use super::{action_of, McpTool, ToolContext, ToolOutcome};

pub struct ManageWorkItemTool;

fn str_field(args: &Value, field: &str) -> Option<String> {
    args.get(field).and_then(Value::as_str).map(str::to_string)
}

fn str_list(args: &Value, field: &str) -> Option<Vec<String>> {
    args.get(field)?.as_array().map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
}

async fn do_create(ctx: &ToolContext, namespace: &str, args: &Value) -> Result<ToolOutcome, ToolError> {
    let item_type: ItemType = str_field(args, "type")
        .ok_or_else(|| ToolError::validation("type", "required"))?
        .parse()
        .map_err(|e| ToolError::validation("type", e))?;
    let title = str_field(args, "title").ok_or_else(|| ToolError::validation("title", "required"))?;
    let priority = match str_field(args, "priority") {
        Some(p) => p.parse::<Priority>().map_err(|e| ToolError::validation("priority", e))?,
        None => Priority::Medium,
    };

    let new = NewWorkItem {
        item_type,
        title,
        description: str_field(args, "description").unwrap_or_default(),
        parent_id: str_field(args, "parent_id"),
        priority,
        tags: str_list(args, "tags").unwrap_or_default(),
        acceptance_criteria: str_list(args, "acceptance_criteria").unwrap_or_default(),
        dependencies: str_list(args, "dependencies").unwrap_or_default(),
        metadata: args.get("metadata").map(ToString::to_string).unwrap_or_else(|| "{}".to_string()),
    };

    let store = ctx.stores.get(namespace).await?;
    let item = work_items::create(store.as_ref(), &ctx.embedding_model, new).await?;
    Ok(ToolOutcome::ok(item))
}

async fn do_update(ctx: &ToolContext, namespace: &str, args: &Value) -> Result<ToolOutcome, ToolError> {
    let id = str_field(args, "work_item_id").ok_or_else(|| ToolError::validation("work_item_id", "required"))?;
    let store = ctx.stores.get(namespace).await?;
    let resolved = work_items::resolve_identifier(store.as_ref(), &id).await?;

    let status = match str_field(args, "status") {
        Some(s) => Some(s.parse::<Status>().map_err(|e| ToolError::validation("status", e))?),
        None => None,
    };
    let priority = match str_field(args, "priority") {
        Some(p) => Some(p.parse::<Priority>().map_err(|e| ToolError::validation("priority", e))?),
        None => None,
    };
    let parent_id = if args.get("parent_id").is_some() {
        Some(str_field(args, "parent_id"))
    } else {
        None
    };

    let patch = UpdatePatch {
        title: str_field(args, "title"),
        description: str_field(args, "description"),
        status,
        priority,
        progress_percentage: args.get("progress_percentage").and_then(Value::as_f64),
        parent_id,
        tags: str_list(args, "tags"),
        acceptance_criteria: str_list(args, "acceptance_criteria"),
        dependencies: str_list(args, "dependencies"),
        metadata: args.get("metadata").map(ToString::to_string),
    };
    let auto_calculate_status = args.get("auto_calculate_status").and_then(Value::as_bool).unwrap_or(true);

    let updated =
        work_items::update(store.as_ref(), &ctx.embedding_model, &resolved.id, patch, auto_calculate_status).await?;
    crate::engine::progress::rollup_ancestors(store.as_ref(), &updated.id).await?;
    Ok(ToolOutcome::ok(updated))
}

async fn do_delete(ctx: &ToolContext, namespace: &str, args: &Value) -> Result<ToolOutcome, ToolError> {
    let id = str_field(args, "work_item_id").ok_or_else(|| ToolError::validation("work_item_id", "required"))?;
    let store = ctx.stores.get(namespace).await?;
    let resolved = work_items::resolve_identifier(store.as_ref(), &id).await?;
    work_items::delete(store.as_ref(), &resolved.id).await?;
    Ok(ToolOutcome::ok_with_message(json!({ "id": resolved.id }), "work item deleted"))
}

#[async_trait]
impl McpTool for ManageWorkItemTool {
    fn name(&self) -> &'static str {
        "jive_manage_work_item"
    }

    fn description(&self) -> &'static str {
        "Create, update, or delete a work item in the Initiative/Epic/Feature/Story/Task hierarchy."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "action": { "type": "string", "enum": ["create", "update", "delete"] },
                "work_item_id": { "type": "string", "description": "id, exact title, or keywords (required for update/delete)" },
                "type": { "type": "string", "enum": ["initiative", "epic", "feature", "story", "task"] },
                "title": { "type": "string" },
                "description": { "type": "string" },
                "status": { "type": "string", "enum": ["not_started", "in_progress", "blocked", "completed", "cancelled"] },
                "priority": { "type": "string", "enum": ["low", "medium", "high", "critical"] },
                "progress_percentage": { "type": "number", "minimum": 0, "maximum": 100 },
                "parent_id": { "type": ["string", "null"] },
                "tags": { "type": "array", "items": { "type": "string" } },
                "acceptance_criteria": { "type": "array", "items": { "type": "string" } },
                "dependencies": { "type": "array", "items": { "type": "string" } },
                "metadata": {},
                "auto_calculate_status": { "type": "boolean", "default": true }
            },
            "required": ["action"]
        })
    }

    async fn execute(&self, ctx: &ToolContext, namespace: &str, args: Value) -> ToolOutcome {
        let result = async {
            match action_of(&args)?.as_str() {
                "create" => do_create(ctx, namespace, &args).await,
                "update" => do_update(ctx, namespace, &args).await,
                "delete" => do_delete(ctx, namespace, &args).await,
                other => Err(ToolError::InvalidAction(other.to_string())),
            }
        }
        .await;
        result.unwrap_or_else(|e| ToolOutcome::from_error(&e))
    }
}
