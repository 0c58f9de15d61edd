//! `jive_search_content`: search (spec §4.4, §4.6). Parses the raw query
//! text into a structured [`SearchQuery`], validates it, and dispatches
//! to [`crate::search::search`] in the requested mode.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::ToolError;
use crate::search::{self, SearchMode};

use super::{action_of, McpTool, ToolContext, ToolOutcome};

pub struct SearchContentTool;

fn parse_mode(args: &Value) -> Result<SearchMode, ToolError> {
    match args.get("search_type").and_then(Value::as_str).unwrap_or("hybrid") {
        "semantic" => Ok(SearchMode::Semantic),
        "keyword" => Ok(SearchMode::Keyword),
        "hybrid" => Ok(SearchMode::Hybrid),
        other => Err(ToolError::validation("search_type", format!("unknown search_type '{other}'"))),
    }
}

async fn do_search(ctx: &ToolContext, namespace: &str, args: &Value) -> Result<ToolOutcome, ToolError> {
    let query_text = args.get("query").and_then(Value::as_str).unwrap_or_default();
    let mut query = search::parse_natural_query(query_text);

    if let Some(limit) = args.get("limit").and_then(Value::as_u64) {
        query.limit = limit as usize;
    }
    if let Some(offset) = args.get("offset").and_then(Value::as_u64) {
        query.offset = offset as usize;
    }
    if let Some(threshold) = args.get("fuzzy_threshold").and_then(Value::as_f64) {
        query.fuzzy_threshold = threshold;
    }

    let validation = search::validate_query(&query);
    if !validation.is_valid {
        return Err(ToolError::validation("query", validation.errors.join("; ")));
    }

    let mode = parse_mode(args)?;
    let store = ctx.stores.get(namespace).await?;
    let results = search::search(store.as_ref(), &ctx.embedding_model, query_text, &query, mode).await?;

    let paged: Vec<_> = results.into_iter().skip(query.offset).take(query.limit).collect();
    Ok(ToolOutcome::ok_with_message(
        json!({ "results": paged, "warnings": validation.warnings }),
        format!("{} matches", paged_len(&paged)),
    ))
}

fn paged_len<T>(v: &[T]) -> usize {
    v.len()
}

#[async_trait]
impl McpTool for SearchContentTool {
    fn name(&self) -> &'static str {
        "jive_search_content"
    }

    fn description(&self) -> &'static str {
        "Search work items by natural-language query using semantic, keyword, or hybrid ranking."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "action": { "type": "string", "enum": ["search"] },
                "query": { "type": "string" },
                "search_type": { "type": "string", "enum": ["semantic", "keyword", "hybrid"], "default": "hybrid" },
                "limit": { "type": "integer", "minimum": 1, "maximum": 1000, "default": 50 },
                "offset": { "type": "integer", "minimum": 0, "default": 0 },
                "fuzzy_threshold": { "type": "number", "minimum": 0.0, "maximum": 1.0, "default": 0.8 }
            },
            "required": ["action", "query"]
        })
    }

    async fn execute(&self, ctx: &ToolContext, namespace: &str, args: Value) -> ToolOutcome {
        let result = async {
            match action_of(&args)?.as_str() {
                "search" => do_search(ctx, namespace, &args).await,
                other => Err(ToolError::InvalidAction(other.to_string())),
            }
        }
        .await;
        result.unwrap_or_else(|e| ToolOutcome::from_error(&e))
    }
}
