//! `jive_get_hierarchy`: get, get_children, get_dependencies,
//! add_dependency, remove_dependency, validate, validate_comprehensive,
//! cleanup_orphans (spec §4.4, §4.5.5-§4.5.7).

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::engine::work_items::{
    self, HierarchyFilter, OrphanAction,
};
use crate::error::ToolError;

use super::{action_of, McpTool, ToolContext, ToolOutcome};

pub struct GetHierarchyTool;

fn filter_of(args: &Value) -> HierarchyFilter {
    HierarchyFilter {
        include_completed: args.get("include_completed").and_then(Value::as_bool).unwrap_or(true),
        include_cancelled: args.get("include_cancelled").and_then(Value::as_bool).unwrap_or(false),
    }
}

fn require_id(args: &Value, field: &str) -> Result<String, ToolError> {
    args.get(field).and_then(Value::as_str).map(str::to_string).ok_or_else(|| ToolError::validation(field, "required"))
}

async fn do_get(ctx: &ToolContext, namespace: &str, args: &Value) -> Result<ToolOutcome, ToolError> {
    let id = require_id(args, "work_item_id")?;
    let store = ctx.stores.get(namespace).await?;
    let id = work_items::resolve_identifier(store.as_ref(), &id).await?.id;
    let filter = filter_of(args);
    let max_depth = args.get("max_depth").and_then(Value::as_u64).unwrap_or(5) as usize;

    match args.get("relationship_type").and_then(Value::as_str).unwrap_or("full_hierarchy") {
        "full_hierarchy" => Ok(ToolOutcome::ok(work_items::full_hierarchy(store.as_ref(), &id, max_depth, filter).await?)),
        "children" => Ok(ToolOutcome::ok(work_items::children(store.as_ref(), &id).await?)),
        "parents" => Ok(ToolOutcome::ok(work_items::parents(store.as_ref(), &id).await?)),
        "ancestors" => Ok(ToolOutcome::ok(work_items::ancestors(store.as_ref(), &id).await?)),
        "descendants" => Ok(ToolOutcome::ok(work_items::descendants(store.as_ref(), &id, filter).await?)),
        other => Err(ToolError::validation("relationship_type", format!("unknown relationship_type '{other}'"))),
    }
}

async fn do_get_children(ctx: &ToolContext, namespace: &str, args: &Value) -> Result<ToolOutcome, ToolError> {
    let id = require_id(args, "work_item_id")?;
    let store = ctx.stores.get(namespace).await?;
    let id = work_items::resolve_identifier(store.as_ref(), &id).await?.id;
    Ok(ToolOutcome::ok(work_items::children(store.as_ref(), &id).await?))
}

async fn do_get_dependencies(ctx: &ToolContext, namespace: &str, args: &Value) -> Result<ToolOutcome, ToolError> {
    let id = require_id(args, "work_item_id")?;
    let store = ctx.stores.get(namespace).await?;
    let id = work_items::resolve_identifier(store.as_ref(), &id).await?.id;
    match args.get("relationship_type").and_then(Value::as_str).unwrap_or("dependencies") {
        "dependencies" => Ok(ToolOutcome::ok(work_items::dependencies(store.as_ref(), &id).await?)),
        "dependents" => Ok(ToolOutcome::ok(work_items::dependents(store.as_ref(), &id).await?)),
        other => Err(ToolError::validation("relationship_type", format!("unknown relationship_type '{other}'"))),
    }
}

async fn do_add_dependency(ctx: &ToolContext, namespace: &str, args: &Value) -> Result<ToolOutcome, ToolError> {
    let id = require_id(args, "work_item_id")?;
    let target = require_id(args, "target_id")?;
    let store = ctx.stores.get(namespace).await?;
    let id = work_items::resolve_identifier(store.as_ref(), &id).await?.id;
    let target = work_items::resolve_identifier(store.as_ref(), &target).await?.id;
    Ok(ToolOutcome::ok(work_items::add_dependency(store.as_ref(), &id, &target).await?))
}

async fn do_remove_dependency(ctx: &ToolContext, namespace: &str, args: &Value) -> Result<ToolOutcome, ToolError> {
    let id = require_id(args, "work_item_id")?;
    let target = require_id(args, "target_id")?;
    let store = ctx.stores.get(namespace).await?;
    let id = work_items::resolve_identifier(store.as_ref(), &id).await?.id;
    let target = work_items::resolve_identifier(store.as_ref(), &target).await?.id;
    Ok(ToolOutcome::ok(work_items::remove_dependency(store.as_ref(), &id, &target).await?))
}

async fn do_validate(ctx: &ToolContext, namespace: &str, _args: &Value) -> Result<ToolOutcome, ToolError> {
    let store = ctx.stores.get(namespace).await?;
    let report = work_items::validate_comprehensive(store.as_ref(), None).await?;
    Ok(ToolOutcome::ok(json!({ "is_valid": report.is_valid })))
}

async fn do_validate_comprehensive(ctx: &ToolContext, namespace: &str, args: &Value) -> Result<ToolOutcome, ToolError> {
    let root_id = args.get("root_id").and_then(Value::as_str);
    let store = ctx.stores.get(namespace).await?;
    Ok(ToolOutcome::ok(work_items::validate_comprehensive(store.as_ref(), root_id).await?))
}

async fn do_cleanup_orphans(ctx: &ToolContext, namespace: &str, args: &Value) -> Result<ToolOutcome, ToolError> {
    let store = ctx.stores.get(namespace).await?;

    let orphan_ids: Vec<String> = match args.get("orphan_ids").and_then(Value::as_array) {
        Some(ids) => ids.iter().filter_map(|v| v.as_str().map(str::to_string)).collect(),
        None => work_items::validate_comprehensive(store.as_ref(), None).await?.orphans,
    };

    let assign_parent = args.get("assign_parent_id").and_then(Value::as_str);
    let action = match args.get("orphan_action").and_then(Value::as_str).unwrap_or("move_to_root") {
        "move_to_root" => OrphanAction::MoveToRoot,
        "delete" => OrphanAction::Delete,
        "assign_parent" => {
            OrphanAction::AssignParent(assign_parent.ok_or_else(|| ToolError::validation("assign_parent_id", "required for assign_parent"))?)
        }
        other => return Err(ToolError::validation("orphan_action", format!("unknown orphan_action '{other}'"))),
    };

    let outcomes = work_items::cleanup_orphans(store.as_ref(), &ctx.embedding_model, &orphan_ids, action).await;
    Ok(ToolOutcome::ok(outcomes))
}

#[async_trait]
impl McpTool for GetHierarchyTool {
    fn name(&self) -> &'static str {
        "jive_get_hierarchy"
    }

    fn description(&self) -> &'static str {
        "Navigate and validate the work-item hierarchy: ancestry, descendants, dependencies, and DAG integrity."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "enum": ["get", "get_children", "get_dependencies", "add_dependency", "remove_dependency", "validate", "validate_comprehensive", "cleanup_orphans"]
                },
                "work_item_id": { "type": "string" },
                "target_id": { "type": "string" },
                "relationship_type": {
                    "type": "string",
                    "enum": ["full_hierarchy", "children", "parents", "ancestors", "descendants", "dependencies", "dependents"]
                },
                "max_depth": { "type": "integer", "minimum": 1, "default": 5 },
                "include_completed": { "type": "boolean", "default": true },
                "include_cancelled": { "type": "boolean", "default": false },
                "root_id": { "type": "string" },
                "orphan_ids": { "type": "array", "items": { "type": "string" } },
                "orphan_action": { "type": "string", "enum": ["move_to_root", "delete", "assign_parent"], "default": "move_to_root" },
                "assign_parent_id": { "type": "string" }
            },
            "required": ["action"]
        })
    }

    async fn execute(&self, ctx: &ToolContext, namespace: &str, args: Value) -> ToolOutcome {
        let result = async {
            match action_of(&args)?.as_str() {
                "get" => do_get(ctx, namespace, &args).await,
                "get_children" => do_get_children(ctx, namespace, &args).await,
                "get_dependencies" => do_get_dependencies(ctx, namespace, &args).await,
                "add_dependency" => do_add_dependency(ctx, namespace, &args).await,
                "remove_dependency" => do_remove_dependency(ctx, namespace, &args).await,
                "validate" => do_validate(ctx, namespace, &args).await,
                "validate_comprehensive" => do_validate_comprehensive(ctx, namespace, &args).await,
                "cleanup_orphans" => do_cleanup_orphans(ctx, namespace, &args).await,
                other => Err(ToolError::InvalidAction(other.to_string())),
            }
        }
        .await;
        result.unwrap_or_else(|e| ToolOutcome::from_error(&e))
    }
}
