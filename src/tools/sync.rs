//! `jive_sync_data`: sync, backup, restore, validate,
//! regenerate_sequence_numbers (spec §4.4, §9). Wire format follows
//! `original_source`'s partial implementation (DESIGN.md Open Question
//! 2): `json` and `yaml` round-trip through `restore`; `markdown` and
//! `csv` are export-only.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};

use crate::engine::work_items::recalculate;
use crate::error::ToolError;
use crate::models::WorkItem;
use crate::store::StoreAdapter;

use super::{action_of, McpTool, ToolContext, ToolOutcome};

pub struct SyncDataTool;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Yaml,
    Markdown,
    Csv,
}

impl Format {
    fn parse(s: &str) -> Result<Self, ToolError> {
        match s {
            "json" => Ok(Self::Json),
            "yaml" => Ok(Self::Yaml),
            "markdown" => Ok(Self::Markdown),
            "csv" => Ok(Self::Csv),
            other => Err(ToolError::validation("format", format!("unknown format '{other}'"))),
        }
    }

    fn importable(self) -> bool {
        matches!(self, Self::Json | Self::Yaml)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MergeStrategy {
    Overwrite,
    SkipExisting,
    Merge,
}

impl MergeStrategy {
    fn parse(s: &str) -> Result<Self, ToolError> {
        match s {
            "overwrite" => Ok(Self::Overwrite),
            "skip_existing" => Ok(Self::SkipExisting),
            "merge" => Ok(Self::Merge),
            other => Err(ToolError::validation("merge_strategy", format!("unknown merge_strategy '{other}'"))),
        }
    }
}

fn require_path(args: &Value) -> Result<String, ToolError> {
    args.get("file_path").and_then(Value::as_str).map(str::to_string).ok_or_else(|| ToolError::validation("file_path", "required"))
}

fn format_of(args: &Value) -> Result<Format, ToolError> {
    Format::parse(args.get("format").and_then(Value::as_str).unwrap_or("json"))
}

fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn render(items: &[WorkItem], format: Format) -> Result<String, ToolError> {
    match format {
        Format::Json => serde_json::to_string_pretty(items).map_err(|e| ToolError::internal(e.to_string())),
        Format::Yaml => serde_yaml::to_string(items).map_err(|e| ToolError::internal(e.to_string())),
        Format::Markdown => {
            let mut out = String::from("| id | type | title | status | progress |\n|---|---|---|---|---|\n");
            for item in items {
                out.push_str(&format!(
                    "| {} | {} | {} | {} | {:.0}% |\n",
                    item.id, item.item_type.as_str(), item.title, item.status.as_str(), item.progress_percentage
                ));
            }
            Ok(out)
        }
        Format::Csv => {
            let mut out = String::from("id,type,title,status,priority,progress_percentage,parent_id\n");
            for item in items {
                out.push_str(&format!(
                    "{},{},{},{},{},{},{}\n",
                    csv_escape(&item.id),
                    csv_escape(item.item_type.as_str()),
                    csv_escape(&item.title),
                    csv_escape(item.status.as_str()),
                    csv_escape(item.priority.as_str()),
                    item.progress_percentage,
                    csv_escape(item.parent_id.as_deref().unwrap_or(""))
                ));
            }
            Ok(out)
        }
    }
}

fn parse_importable(body: &str, format: Format) -> Result<Vec<WorkItem>, ToolError> {
    match format {
        Format::Json => serde_json::from_str(body).map_err(|e| ToolError::validation("file_path", format!("invalid json: {e}"))),
        Format::Yaml => serde_yaml::from_str(body).map_err(|e| ToolError::validation("file_path", format!("invalid yaml: {e}"))),
        Format::Markdown | Format::Csv => Err(ToolError::validation("format", "markdown/csv are export-only and cannot be restored")),
    }
}

async fn write_to_file(store: &dyn StoreAdapter, path: &str, format: Format) -> Result<usize, ToolError> {
    let items = store.list_work_items().await?;
    let body = render(&items, format)?;
    tokio::fs::write(path, body).await.map_err(|e| ToolError::internal(format!("writing '{path}': {e}")))?;
    Ok(items.len())
}

#[derive(Debug, Default, Serialize)]
struct RestoreSummary {
    imported: usize,
    updated: usize,
    skipped: usize,
    errors: Vec<String>,
}

async fn restore_from_file(
    store: &dyn StoreAdapter,
    path: &str,
    format: Format,
    strategy: MergeStrategy,
) -> Result<RestoreSummary, ToolError> {
    if !format.importable() {
        return Err(ToolError::validation("format", "markdown/csv are export-only and cannot be restored"));
    }
    let body = tokio::fs::read_to_string(path).await.map_err(|e| ToolError::validation("file_path", format!("reading '{path}': {e}")))?;
    let incoming = parse_importable(&body, format)?;

    let mut summary = RestoreSummary::default();
    for item in incoming {
        let existing = store.get_work_item(&item.id).await?;
        match (existing, strategy) {
            (None, _) => {
                store.add_work_item(&item).await?;
                summary.imported += 1;
            }
            (Some(_), MergeStrategy::SkipExisting) => {
                summary.skipped += 1;
            }
            (Some(_), MergeStrategy::Overwrite | MergeStrategy::Merge) => {
                store.delete_work_item(&item.id).await?;
                store.add_work_item(&item).await?;
                summary.updated += 1;
            }
        }
    }
    Ok(summary)
}

async fn do_sync(ctx: &ToolContext, namespace: &str, args: &Value) -> Result<ToolOutcome, ToolError> {
    let path = require_path(args)?;
    let format = format_of(args)?;
    let strategy = MergeStrategy::parse(args.get("merge_strategy").and_then(Value::as_str).unwrap_or("overwrite"))?;
    let store = ctx.stores.get(namespace).await?;

    match args.get("direction").and_then(Value::as_str).unwrap_or("bidirectional") {
        "db_to_file" => {
            let count = write_to_file(store.as_ref(), &path, format).await?;
            Ok(ToolOutcome::ok(json!({ "direction": "db_to_file", "items_written": count })))
        }
        "file_to_db" => {
            let summary = restore_from_file(store.as_ref(), &path, format, strategy).await?;
            Ok(ToolOutcome::ok(json!({ "direction": "file_to_db", "summary": summary })))
        }
        "bidirectional" => {
            let written = write_to_file(store.as_ref(), &path, format).await?;
            let summary = restore_from_file(store.as_ref(), &path, format, strategy).await?;
            Ok(ToolOutcome::ok(json!({ "direction": "bidirectional", "items_written": written, "summary": summary })))
        }
        other => Err(ToolError::validation("direction", format!("unknown direction '{other}'"))),
    }
}

async fn do_backup(ctx: &ToolContext, namespace: &str, args: &Value) -> Result<ToolOutcome, ToolError> {
    let path = require_path(args)?;
    let format = format_of(args)?;
    let store = ctx.stores.get(namespace).await?;
    let count = write_to_file(store.as_ref(), &path, format).await?;
    Ok(ToolOutcome::ok_with_message(json!({ "file_path": path, "items_written": count }), "backup written"))
}

async fn do_restore(ctx: &ToolContext, namespace: &str, args: &Value) -> Result<ToolOutcome, ToolError> {
    let path = require_path(args)?;
    let format = format_of(args)?;
    let strategy = MergeStrategy::parse(args.get("merge_strategy").and_then(Value::as_str).unwrap_or("overwrite"))?;
    if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
        return Err(ToolError::BackupNotFound(path));
    }
    let store = ctx.stores.get(namespace).await?;
    let summary = restore_from_file(store.as_ref(), &path, format, strategy).await?;
    Ok(ToolOutcome::ok(summary))
}

async fn do_validate(_ctx: &ToolContext, _namespace: &str, args: &Value) -> Result<ToolOutcome, ToolError> {
    let path = require_path(args)?;
    let format = format_of(args)?;
    if !format.importable() {
        return Ok(ToolOutcome::ok(json!({ "valid": true, "note": "export-only format, no structural check performed" })));
    }
    let body = tokio::fs::read_to_string(&path).await.map_err(|e| ToolError::validation("file_path", format!("reading '{path}': {e}")))?;
    match parse_importable(&body, format) {
        Ok(items) => {
            let mut seen = std::collections::HashSet::new();
            let duplicates: Vec<String> = items.iter().filter(|i| !seen.insert(i.id.clone())).map(|i| i.id.clone()).collect();
            Ok(ToolOutcome::ok(json!({
                "valid": duplicates.is_empty(),
                "item_count": items.len(),
                "duplicate_ids": duplicates,
            })))
        }
        Err(e) => Ok(ToolOutcome::ok(json!({ "valid": false, "error": e.to_string() }))),
    }
}

async fn do_regenerate(ctx: &ToolContext, namespace: &str, _args: &Value) -> Result<ToolOutcome, ToolError> {
    let store = ctx.stores.get(namespace).await?;
    Ok(ToolOutcome::ok(recalculate(store.as_ref()).await?))
}

#[async_trait]
impl McpTool for SyncDataTool {
    fn name(&self) -> &'static str {
        "jive_sync_data"
    }

    fn description(&self) -> &'static str {
        "Synchronize work items with an external file, take/restore backups, and regenerate sequence numbers."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "action": { "type": "string", "enum": ["sync", "backup", "restore", "validate", "regenerate_sequence_numbers"] },
                "file_path": { "type": "string" },
                "format": { "type": "string", "enum": ["json", "yaml", "markdown", "csv"], "default": "json" },
                "direction": { "type": "string", "enum": ["db_to_file", "file_to_db", "bidirectional"], "default": "bidirectional" },
                "merge_strategy": { "type": "string", "enum": ["overwrite", "skip_existing", "merge"], "default": "overwrite" }
            },
            "required": ["action"]
        })
    }

    async fn execute(&self, ctx: &ToolContext, namespace: &str, args: Value) -> ToolOutcome {
        let result = async {
            match action_of(&args)?.as_str() {
                "sync" => do_sync(ctx, namespace, &args).await,
                "backup" => do_backup(ctx, namespace, &args).await,
                "restore" => do_restore(ctx, namespace, &args).await,
                "validate" => do_validate(ctx, namespace, &args).await,
                "regenerate_sequence_numbers" => do_regenerate(ctx, namespace, &args).await,
                other => Err(ToolError::InvalidAction(other.to_string())),
            }
        }
        .await;
        result.unwrap_or_else(|e| ToolOutcome::from_error(&e))
    }
}
