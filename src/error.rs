//! Error types for the work-item MCP server.
//!
//! Mirrors the split the teacher uses between a transport/client-level
//! error and a tool-level error: `ServerError` carries the JSON-RPC error
//! code the dispatcher must reply with, `ToolError` carries the stable
//! `error_code` string a tool response envelope exposes to callers.

use thiserror::Error;

/// Errors surfaced by the dispatcher, session manager, and transports.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Malformed JSON on the wire.
    #[error("parse error: {0}")]
    Parse(String),

    /// Well-formed JSON-RPC envelope with a missing/invalid field.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// No handler registered for the requested method.
    #[error("method not found: {0}")]
    MethodNotFound(String),

    /// Invalid params, invalid tool action, or namespace access denied.
    #[error("invalid params: {0}")]
    InvalidParams(String),

    /// `Mcp-Session-Id` does not resolve to a live session.
    #[error("invalid session: {0}")]
    InvalidSession(String),

    /// Namespace-related failure (validation, missing, binding conflict).
    #[error("namespace error: {0}")]
    Namespace(#[from] crate::namespace::NamespaceError),

    /// Storage-layer failure.
    #[error("storage error: {0}")]
    Storage(#[from] crate::store::StoreError),

    /// Anything else.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// JSON-RPC 2.0 error code, per spec §7.
    #[must_use]
    pub fn json_rpc_code(&self) -> i64 {
        match self {
            Self::Parse(_) => -32700,
            Self::InvalidRequest(_) => -32600,
            Self::MethodNotFound(_) => -32601,
            Self::InvalidParams(_) => -32602,
            Self::InvalidSession(_) => -32002,
            Self::Namespace(_) => -32602,
            Self::Storage(_) | Self::Internal(_) => -32603,
        }
    }
}

/// Errors from MCP tool execution. Tools never panic or propagate these as
/// exceptions; every action handler returns `Result<ToolOutcome, ToolError>`
/// and the registry folds `Err` into a `{success:false, error, error_code}`
/// envelope (spec §4.3.2, §7).
#[derive(Error, Debug, Clone)]
pub enum ToolError {
    #[error("work item not found: {0}")]
    WorkItemNotFound(String),

    #[error("circular dependency: {0}")]
    CircularDependency(String),

    #[error("unknown action '{0}' for this tool")]
    InvalidAction(String),

    #[error("validation error: field '{field}': {message}")]
    Validation { field: String, message: String },

    #[error("namespace invalid: {0}")]
    NamespaceInvalid(String),

    #[error("namespace denied: bound to '{bound}', requested '{requested}'")]
    NamespaceDenied { bound: String, requested: String },

    #[error("backup not found: {0}")]
    BackupNotFound(String),

    #[error("hierarchy violation: {0}")]
    HierarchyViolation(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ToolError {
    /// Stable machine-readable code consumed by clients (spec §7).
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::WorkItemNotFound(_) => "WORK_ITEM_NOT_FOUND",
            Self::CircularDependency(_) => "CIRCULAR_DEPENDENCY",
            Self::InvalidAction(_) => "INVALID_ACTION",
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::NamespaceInvalid(_) => "NAMESPACE_INVALID",
            Self::NamespaceDenied { .. } => "NAMESPACE_DENIED",
            Self::BackupNotFound(_) => "BACKUP_NOT_FOUND",
            Self::HierarchyViolation(_) => "HIERARCHY_VIOLATION",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    #[must_use]
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation { field: field.into(), message: message.into() }
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

impl From<crate::store::StoreError> for ToolError {
    fn from(e: crate::store::StoreError) -> Self {
        Self::Storage(e.to_string())
    }
}

impl From<crate::namespace::NamespaceError> for ToolError {
    fn from(e: crate::namespace::NamespaceError) -> Self {
        Self::NamespaceInvalid(e.to_string())
    }
}

pub type ServerResult<T> = Result<T, ServerError>;
pub type ToolResult<T> = Result<T, ToolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_rpc_codes_match_spec_table() {
        assert_eq!(ServerError::Parse("x".into()).json_rpc_code(), -32700);
        assert_eq!(ServerError::InvalidRequest("x".into()).json_rpc_code(), -32600);
        assert_eq!(ServerError::MethodNotFound("x".into()).json_rpc_code(), -32601);
        assert_eq!(ServerError::InvalidParams("x".into()).json_rpc_code(), -32602);
        assert_eq!(ServerError::InvalidSession("x".into()).json_rpc_code(), -32002);
        assert_eq!(ServerError::Internal("x".into()).json_rpc_code(), -32603);
    }

    #[test]
    fn tool_error_codes_are_stable_strings() {
        assert_eq!(ToolError::WorkItemNotFound("x".into()).error_code(), "WORK_ITEM_NOT_FOUND");
        assert_eq!(
            ToolError::CircularDependency("x".into()).error_code(),
            "CIRCULAR_DEPENDENCY"
        );
        assert_eq!(ToolError::InvalidAction("x".into()).error_code(), "INVALID_ACTION");
    }
}
