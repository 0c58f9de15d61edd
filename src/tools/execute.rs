//! `jive_execute_work_item`: execute, status, cancel, validate (spec
//! §4.4, §4.7). `execute` starts a new execution record and transitions
//! it straight to `running`; completion/failure of a running execution
//! is reported back through `jive_track_progress`'s `track` action
//! (spec §4.7), which is what actually drives an execution to a
//! terminal state in this server.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::engine::{execution, work_items};
use crate::error::ToolError;

use super::{action_of, McpTool, ToolContext, ToolOutcome};

pub struct ExecuteWorkItemTool;

fn require_id(args: &Value, field: &str) -> Result<String, ToolError> {
    args.get(field).and_then(Value::as_str).map(str::to_string).ok_or_else(|| ToolError::validation(field, "required"))
}

async fn do_execute(ctx: &ToolContext, namespace: &str, args: &Value) -> Result<ToolOutcome, ToolError> {
    let id = require_id(args, "work_item_id")?;
    let agent_id = args.get("agent_id").and_then(Value::as_str).map(str::to_string);
    let store = ctx.stores.get(namespace).await?;
    let id = work_items::resolve_identifier(store.as_ref(), &id).await?.id;

    let blocking = execution::validate_ready(store.as_ref(), &id).await?;
    if !blocking.is_empty() {
        let titles: Vec<&str> = blocking.iter().map(|i| i.title.as_str()).collect();
        return Err(ToolError::HierarchyViolation(format!(
            "cannot execute '{id}': incomplete dependencies {}",
            titles.join(", ")
        )));
    }

    let record = execution::start(store.as_ref(), &id, agent_id).await?;
    Ok(ToolOutcome::ok(record))
}

async fn do_status(ctx: &ToolContext, namespace: &str, args: &Value) -> Result<ToolOutcome, ToolError> {
    let store = ctx.stores.get(namespace).await?;
    if let Some(execution_id) = args.get("execution_id").and_then(Value::as_str) {
        return Ok(ToolOutcome::ok(execution::status(store.as_ref(), execution_id).await?));
    }
    let work_item_id = require_id(args, "work_item_id")?;
    let work_item_id = work_items::resolve_identifier(store.as_ref(), &work_item_id).await?.id;
    Ok(ToolOutcome::ok(execution::history(store.as_ref(), &work_item_id).await?))
}

async fn do_cancel(ctx: &ToolContext, namespace: &str, args: &Value) -> Result<ToolOutcome, ToolError> {
    let execution_id = require_id(args, "execution_id")?;
    let store = ctx.stores.get(namespace).await?;
    Ok(ToolOutcome::ok(execution::cancel(store.as_ref(), &execution_id).await?))
}

async fn do_validate(ctx: &ToolContext, namespace: &str, args: &Value) -> Result<ToolOutcome, ToolError> {
    let id = require_id(args, "work_item_id")?;
    let store = ctx.stores.get(namespace).await?;
    let id = work_items::resolve_identifier(store.as_ref(), &id).await?.id;
    let blocking = execution::validate_ready(store.as_ref(), &id).await?;
    Ok(ToolOutcome::ok(json!({ "ready": blocking.is_empty(), "blocking_dependencies": blocking })))
}

#[async_trait]
impl McpTool for ExecuteWorkItemTool {
    fn name(&self) -> &'static str {
        "jive_execute_work_item"
    }

    fn description(&self) -> &'static str {
        "Start, inspect, cancel, or validate readiness of a work item's execution."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "action": { "type": "string", "enum": ["execute", "status", "cancel", "validate"] },
                "work_item_id": { "type": "string" },
                "execution_id": { "type": "string" },
                "agent_id": { "type": "string" }
            },
            "required": ["action"]
        })
    }

    async fn execute(&self, ctx: &ToolContext, namespace: &str, args: Value) -> ToolOutcome {
        let result = async {
            match action_of(&args)?.as_str() {
                "execute" => do_execute(ctx, namespace, &args).await,
                "status" => do_status(ctx, namespace, &args).await,
                "cancel" => do_cancel(ctx, namespace, &args).await,
                "validate" => do_validate(ctx, namespace, &args).await,
                other => Err(ToolError::InvalidAction(other.to_string())),
            }
        }
        .await;
        result.unwrap_or_else(|e| ToolOutcome::from_error(&e))
    }
}
