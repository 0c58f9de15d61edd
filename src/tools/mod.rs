//! The seven unified MCP tools (spec §4.4). Trait shape grounded on the
//! teacher's `tools/mod.rs` (`McpTool::{name, description, input_schema,
//! execute}`, `register_all_tools`); `execute` is generalized to thread a
//! resolved namespace and return a structured [`ToolOutcome`] rather than
//! a pre-formatted string, since the dispatcher (spec §4.3.2) serialises
//! the envelope itself rather than trusting the tool to format text.

pub mod execute;
pub mod get;
pub mod hierarchy;
pub mod legacy;
pub mod manage;
pub mod progress;
pub mod reorder;
pub mod search;
pub mod sync;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::error::ToolError;
use crate::namespace::NamespaceManager;
use crate::store::StoreRegistry;

/// Shared collaborators every tool action needs (spec §4.4): the store
/// registry (one `SqliteStore` per namespace), the namespace manager, and
/// the embedding model name used to vectorise new/updated items.
pub struct ToolContext {
    pub stores: Arc<StoreRegistry>,
    pub namespaces: Arc<NamespaceManager>,
    pub embedding_model: String,
}

impl ToolContext {
    #[must_use]
    pub fn new(stores: Arc<StoreRegistry>, namespaces: Arc<NamespaceManager>, embedding_model: String) -> Self {
        Self { stores, namespaces, embedding_model }
    }
}

/// Tool response envelope (spec §4.3.2): the dispatcher wraps this in an
/// MCP `CallToolResult` whose `content` is a single JSON-serialized text
/// item, setting `isError` iff `success` is false.
#[derive(Debug, Clone, Serialize)]
pub struct ToolOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl ToolOutcome {
    #[must_use]
    pub fn ok(data: impl Serialize) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            message: None,
            error: None,
            error_code: None,
            metadata: None,
        }
    }

    #[must_use]
    pub fn ok_with_message(data: impl Serialize, message: impl Into<String>) -> Self {
        let mut outcome = Self::ok(data);
        outcome.message = Some(message.into());
        outcome
    }

    #[must_use]
    pub fn from_error(err: &ToolError) -> Self {
        Self {
            success: false,
            data: None,
            message: None,
            error: Some(err.to_string()),
            error_code: Some(err.error_code()),
            metadata: None,
        }
    }
}

/// One of the seven unified tools (spec §4.4), each a tagged variant over
/// its own `action` discriminator.
#[async_trait]
pub trait McpTool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn input_schema(&self) -> Value;

    /// `namespace` has already been resolved by the dispatcher (spec
    /// §4.3.3); `args` is the raw tool-call argument object, including
    /// the `action` discriminator.
    async fn execute(&self, ctx: &ToolContext, namespace: &str, args: Value) -> ToolOutcome;
}

fn missing_action() -> ToolError {
    ToolError::validation("action", "required")
}

/// Reads the `action` discriminator every tool call carries.
pub(crate) fn action_of(args: &Value) -> Result<String, ToolError> {
    args.get("action").and_then(Value::as_str).map(str::to_string).ok_or_else(missing_action)
}

#[must_use]
pub fn register_all_tools() -> Vec<Box<dyn McpTool>> {
    vec![
        Box::new(manage::ManageWorkItemTool),
        Box::new(get::GetWorkItemTool),
        Box::new(search::SearchContentTool),
        Box::new(hierarchy::GetHierarchyTool),
        Box::new(execute::ExecuteWorkItemTool),
        Box::new(progress::TrackProgressTool),
        Box::new(sync::SyncDataTool),
        Box::new(reorder::ReorderWorkItemsTool),
    ]
}
