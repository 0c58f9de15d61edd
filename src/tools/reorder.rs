//! `jive_reorder_work_items`: reorder, move, swap, recalculate (spec
//! §4.4, §4.5.4).

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::engine::work_items::{self, move_item, recalculate, reorder, swap};
use crate::error::ToolError;

use super::{action_of, McpTool, ToolContext, ToolOutcome};

pub struct ReorderWorkItemsTool;

fn require_id(args: &Value, field: &str) -> Result<String, ToolError> {
    args.get(field).and_then(Value::as_str).map(str::to_string).ok_or_else(|| ToolError::validation(field, "required"))
}

async fn do_reorder(ctx: &ToolContext, namespace: &str, args: &Value) -> Result<ToolOutcome, ToolError> {
    let ids: Vec<String> = args
        .get("work_item_ids")
        .and_then(Value::as_array)
        .ok_or_else(|| ToolError::validation("work_item_ids", "required"))?
        .iter()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect();
    let store = ctx.stores.get(namespace).await?;
    Ok(ToolOutcome::ok(reorder(store.as_ref(), &ids).await?))
}

async fn do_move(ctx: &ToolContext, namespace: &str, args: &Value) -> Result<ToolOutcome, ToolError> {
    let id = require_id(args, "work_item_id")?;
    let new_parent_id = args.get("new_parent_id").and_then(Value::as_str).map(str::to_string);
    let position = args.get("position").and_then(Value::as_i64).unwrap_or(-1);
    let store = ctx.stores.get(namespace).await?;
    let id = work_items::resolve_identifier(store.as_ref(), &id).await?.id;
    Ok(ToolOutcome::ok(move_item(store.as_ref(), &id, new_parent_id, position).await?))
}

async fn do_swap(ctx: &ToolContext, namespace: &str, args: &Value) -> Result<ToolOutcome, ToolError> {
    let a = require_id(args, "work_item_id_a")?;
    let b = require_id(args, "work_item_id_b")?;
    let store = ctx.stores.get(namespace).await?;
    let a = work_items::resolve_identifier(store.as_ref(), &a).await?.id;
    let b = work_items::resolve_identifier(store.as_ref(), &b).await?.id;
    let (first, second) = swap(store.as_ref(), &a, &b).await?;
    Ok(ToolOutcome::ok(json!({ "a": first, "b": second })))
}

async fn do_recalculate(ctx: &ToolContext, namespace: &str, _args: &Value) -> Result<ToolOutcome, ToolError> {
    let store = ctx.stores.get(namespace).await?;
    Ok(ToolOutcome::ok(recalculate(store.as_ref()).await?))
}

#[async_trait]
impl McpTool for ReorderWorkItemsTool {
    fn name(&self) -> &'static str {
        "jive_reorder_work_items"
    }

    fn description(&self) -> &'static str {
        "Reorder siblings, move an item to a new parent, swap two items' positions, or recompute sequence numbers."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "action": { "type": "string", "enum": ["reorder", "move", "swap", "recalculate"] },
                "work_item_ids": { "type": "array", "items": { "type": "string" } },
                "work_item_id": { "type": "string" },
                "new_parent_id": { "type": ["string", "null"] },
                "position": { "type": "integer", "default": -1 },
                "work_item_id_a": { "type": "string" },
                "work_item_id_b": { "type": "string" }
            },
            "required": ["action"]
        })
    }

    async fn execute(&self, ctx: &ToolContext, namespace: &str, args: Value) -> ToolOutcome {
        let result = async {
            match action_of(&args)?.as_str() {
                "reorder" => do_reorder(ctx, namespace, &args).await,
                "move" => do_move(ctx, namespace, &args).await,
                "swap" => do_swap(ctx, namespace, &args).await,
                "recalculate" => do_recalculate(ctx, namespace, &args).await,
                other => Err(ToolError::InvalidAction(other.to_string())),
            }
        }
        .await;
        result.unwrap_or_else(|e| ToolOutcome::from_error(&e))
    }
}
