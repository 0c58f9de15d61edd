//! Protocol dispatcher (spec §4.3): the single method-dispatch path
//! shared by all three transports. Grounded on the teacher's
//! `server/transport.rs` `handle_tools_call`/`handle_initialize` match
//! arms, generalized to also resolve a namespace per request (spec
//! §4.3.3) and translate legacy tool names (spec §4.3.4) before
//! dispatch.

use serde_json::{json, Value};

use crate::config::Config;
use crate::error::ServerError;
use crate::rpc::{JsonRpcRequest, JsonRpcResponse, McpToolInfo};
use crate::session::Session;
use crate::tools::legacy::LegacyRegistry;
use crate::tools::{McpTool, ToolContext, ToolOutcome};

pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Shared, process-wide collaborators the dispatcher needs regardless of
/// which transport is driving it.
pub struct Dispatcher {
    pub tools: Vec<Box<dyn McpTool>>,
    pub tool_ctx: ToolContext,
    pub config: Config,
    pub legacy: LegacyRegistry,
}

impl Dispatcher {
    #[must_use]
    pub fn new(tools: Vec<Box<dyn McpTool>>, tool_ctx: ToolContext, config: Config) -> Self {
        Self { tools, tool_ctx, config, legacy: LegacyRegistry::new() }
    }

    fn find_tool(&self, name: &str) -> Option<&dyn McpTool> {
        self.tools.iter().find(|t| t.name() == name).map(AsRef::as_ref)
    }

    /// Namespace resolution precedence (spec §4.3.3): URL path segment,
    /// session's `bound_namespace`, request/tool-args `namespace` field,
    /// environment default, literal `"default"`. Returns an error if the
    /// session is bound to a different namespace than the one requested.
    pub async fn resolve_namespace(
        &self,
        session: &Session,
        url_namespace: Option<&str>,
        args: &Value,
    ) -> Result<String, ServerError> {
        let requested = args.get("namespace").and_then(Value::as_str);
        let bound = session.bound_namespace.read().await.clone();

        if let (Some(bound), Some(requested)) = (&bound, requested) {
            if bound != requested {
                return Err(ServerError::InvalidParams(format!(
                    "session is bound to namespace '{bound}', cannot service request for '{requested}'"
                )));
            }
        }

        let resolved = url_namespace
            .filter(|ns| *ns != "default")
            .map(str::to_string)
            .or_else(|| bound.clone())
            .or_else(|| requested.map(str::to_string))
            .unwrap_or_else(|| self.tool_ctx.namespaces.environment_default().to_string());

        self.tool_ctx.namespaces.ensure_exists(&resolved).await.map_err(ServerError::Namespace)?;

        if bound.is_none() {
            session.bind_namespace(&resolved).await;
        }

        Ok(resolved)
    }

    fn list_tool_info(&self) -> Vec<McpToolInfo> {
        self.tools
            .iter()
            .map(|t| McpToolInfo {
                name: t.name().to_string(),
                description: t.description().to_string(),
                input_schema: t.input_schema(),
            })
            .collect()
    }

    /// Negotiates protocol version/capabilities, opens the session (spec
    /// §3.4, §4.3.1), and binds it to an explicit namespace when the
    /// client names one in `params` or `params._meta.namespace`.
    async fn handle_initialize(&self, session: &Session, params: &Value) -> Result<Value, ServerError> {
        let protocol_version =
            params.get("protocolVersion").and_then(Value::as_str).unwrap_or(PROTOCOL_VERSION).to_string();
        let client_info = params.get("clientInfo").cloned().unwrap_or_else(|| json!({}));
        let capabilities = params.get("capabilities").cloned().unwrap_or_else(|| json!({}));
        session.initialize(protocol_version.clone(), client_info, capabilities).await;

        let explicit_namespace = params
            .get("namespace")
            .and_then(Value::as_str)
            .or_else(|| params.get("_meta").and_then(|m| m.get("namespace")).and_then(Value::as_str));
        if let Some(namespace) = explicit_namespace {
            self.tool_ctx.namespaces.ensure_exists(namespace).await.map_err(ServerError::Namespace)?;
            session.bind_namespace(namespace).await;
        }

        Ok(json!({
            "protocolVersion": protocol_version,
            "capabilities": { "tools": {}, "prompts": {}, "resources": {}, "logging": {} },
            "serverInfo": { "name": "jive-mcp", "version": env!("CARGO_PKG_VERSION") },
            "sessionId": session.id,
        }))
    }

    async fn handle_tools_call(
        &self,
        session: &Session,
        url_namespace: Option<&str>,
        params: &Value,
    ) -> Result<Value, ServerError> {
        let mut name = params.get("name").and_then(Value::as_str).unwrap_or_default().to_string();
        let mut args = params.get("arguments").cloned().unwrap_or_else(|| json!({}));

        if crate::tools::legacy::is_legacy_tool(&name) {
            let (new_name, new_args) =
                self.legacy.translate(&name, args).map_err(|_| ServerError::MethodNotFound(name.clone()))?;
            name = new_name.to_string();
            args = new_args;
        }

        let tool = self.find_tool(&name).ok_or_else(|| ServerError::MethodNotFound(name.clone()))?;
        let namespace = self.resolve_namespace(session, url_namespace, &args).await?;
        let timeout = self.config.tool_timeouts.for_tool(tool.name());

        let outcome = tokio::time::timeout(timeout, tool.execute(&self.tool_ctx, &namespace, args))
            .await
            .unwrap_or_else(|_| ToolOutcome::from_error(&crate::error::ToolError::internal("tool call timed out")));

        Ok(render_tool_outcome(&outcome))
    }

    /// Dispatch a single JSON-RPC request (spec §4.3.1). `None` is
    /// returned for notifications, which never produce a response.
    pub async fn dispatch(
        &self,
        session: &Session,
        url_namespace: Option<&str>,
        request: JsonRpcRequest,
    ) -> Option<JsonRpcResponse> {
        let id = request.id.clone();
        if request.is_notification() {
            return None;
        }

        let result = match request.method.as_str() {
            "initialize" => self.handle_initialize(session, &request.params).await,
            "tools/list" => Ok(json!({ "tools": self.list_tool_info() })),
            "tools/call" => self.handle_tools_call(session, url_namespace, &request.params).await,
            "ping" => Ok(json!({})),
            other => Err(ServerError::MethodNotFound(other.to_string())),
        };

        Some(match result {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(err) => JsonRpcResponse::from_server_error(id, &err),
        })
    }
}

fn render_tool_outcome(outcome: &ToolOutcome) -> Value {
    let text = serde_json::to_string(outcome).unwrap_or_else(|_| "{}".to_string());
    json!({
        "content": [{ "type": "text", "text": text }],
        "isError": !outcome.success,
    })
}
