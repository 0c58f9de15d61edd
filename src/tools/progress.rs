//! `jive_track_progress`: track, report, milestone, analytics, status
//! (spec §4.4, §4.7).

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::engine::{progress, work_items};
use crate::error::ToolError;

use super::{action_of, McpTool, ToolContext, ToolOutcome};

pub struct TrackProgressTool;

fn require_id(args: &Value, field: &str) -> Result<String, ToolError> {
    args.get(field).and_then(Value::as_str).map(str::to_string).ok_or_else(|| ToolError::validation(field, "required"))
}

async fn do_track(ctx: &ToolContext, namespace: &str, args: &Value) -> Result<ToolOutcome, ToolError> {
    let id = require_id(args, "work_item_id")?;
    let percentage = args
        .get("progress_percentage")
        .and_then(Value::as_f64)
        .ok_or_else(|| ToolError::validation("progress_percentage", "required"))?;
    let notes = args.get("notes").and_then(Value::as_str).map(str::to_string);

    let store = ctx.stores.get(namespace).await?;
    let id = work_items::resolve_identifier(store.as_ref(), &id).await?.id;
    let item = progress::track(store.as_ref(), &id, percentage, notes).await?;
    progress::rollup_ancestors(store.as_ref(), &item.id).await?;
    Ok(ToolOutcome::ok(item))
}

async fn do_report(ctx: &ToolContext, namespace: &str, args: &Value) -> Result<ToolOutcome, ToolError> {
    let id = require_id(args, "work_item_id")?;
    let store = ctx.stores.get(namespace).await?;
    let id = work_items::resolve_identifier(store.as_ref(), &id).await?.id;
    Ok(ToolOutcome::ok(progress::report(store.as_ref(), &id).await?))
}

async fn do_milestone(ctx: &ToolContext, namespace: &str, args: &Value) -> Result<ToolOutcome, ToolError> {
    let id = require_id(args, "work_item_id")?;
    let milestone_name = require_id(args, "milestone_name")?;
    let store = ctx.stores.get(namespace).await?;
    let id = work_items::resolve_identifier(store.as_ref(), &id).await?.id;

    // A milestone is recorded as a 100%-complete progress checkpoint
    // tagged with its name, rather than a separate persisted entity
    // (spec §9: no dedicated milestone table).
    let item = progress::track(store.as_ref(), &id, 100.0, Some(format!("milestone: {milestone_name}"))).await?;
    progress::rollup_ancestors(store.as_ref(), &item.id).await?;
    Ok(ToolOutcome::ok_with_message(item, format!("milestone '{milestone_name}' recorded")))
}

async fn do_analytics(ctx: &ToolContext, namespace: &str, _args: &Value) -> Result<ToolOutcome, ToolError> {
    let store = ctx.stores.get(namespace).await?;
    Ok(ToolOutcome::ok(progress::analytics(store.as_ref()).await?))
}

async fn do_status(ctx: &ToolContext, namespace: &str, args: &Value) -> Result<ToolOutcome, ToolError> {
    let id = require_id(args, "work_item_id")?;
    let store = ctx.stores.get(namespace).await?;
    let item = work_items::resolve_identifier(store.as_ref(), &id).await?;
    Ok(ToolOutcome::ok(json!({
        "id": item.id,
        "status": item.status,
        "progress_percentage": item.progress_percentage,
    })))
}

#[async_trait]
impl McpTool for TrackProgressTool {
    fn name(&self) -> &'static str {
        "jive_track_progress"
    }

    fn description(&self) -> &'static str {
        "Record progress updates, milestones, and retrieve progress reports or namespace-wide analytics."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "action": { "type": "string", "enum": ["track", "report", "milestone", "analytics", "status"] },
                "work_item_id": { "type": "string" },
                "progress_percentage": { "type": "number", "minimum": 0, "maximum": 100 },
                "notes": { "type": "string" },
                "milestone_name": { "type": "string" }
            },
            "required": ["action"]
        })
    }

    async fn execute(&self, ctx: &ToolContext, namespace: &str, args: Value) -> ToolOutcome {
        let result = async {
            match action_of(&args)?.as_str() {
                "track" => do_track(ctx, namespace, &args).await,
                "report" => do_report(ctx, namespace, &args).await,
                "milestone" => do_milestone(ctx, namespace, &args).await,
                "analytics" => do_analytics(ctx, namespace, &args).await,
                "status" => do_status(ctx, namespace, &args).await,
                other => Err(ToolError::InvalidAction(other.to_string())),
            }
        }
        .await;
        result.unwrap_or_else(|e| ToolOutcome::from_error(&e))
    }
}
