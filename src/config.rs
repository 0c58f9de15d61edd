//! Server configuration (spec §6.3).
//!
//! Loaded from environment, the way the teacher's `Config::from_env`
//! overlays env vars onto defaults; `main.rs`'s `clap::Parser` CLI then
//! overlays explicit flags on top of that, matching the teacher's
//! CLI-over-env precedence.

use std::time::Duration;

/// Per-tool timeout defaults (spec §5). Overridable via
/// `tools.<tool>.timeout_seconds`.
pub mod tool_timeouts {
    use std::time::Duration;

    pub const EXECUTE: Duration = Duration::from_secs(300);
    pub const SYNC: Duration = Duration::from_secs(120);
    pub const SEARCH: Duration = Duration::from_secs(30);
    pub const PROGRESS: Duration = Duration::from_secs(90);
    pub const MANAGE: Duration = Duration::from_secs(60);
    pub const GET: Duration = Duration::from_secs(30);
    pub const HIERARCHY: Duration = Duration::from_secs(60);
    pub const REORDER: Duration = Duration::from_secs(30);
}

/// Embedding dimensionality (spec §6.2).
pub const EMBEDDING_DIM: usize = 384;

/// Stdio handshake deadline (spec §4.1).
pub const STDIO_HANDSHAKE_DEADLINE: Duration = Duration::from_secs(30);

/// HTTP SSE heartbeat interval (spec §4.1).
pub const SSE_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct ToolTimeouts {
    pub execute: Duration,
    pub sync: Duration,
    pub search: Duration,
    pub progress: Duration,
    pub manage: Duration,
    pub get: Duration,
    pub hierarchy: Duration,
    pub reorder: Duration,
}

impl Default for ToolTimeouts {
    fn default() -> Self {
        Self {
            execute: tool_timeouts::EXECUTE,
            sync: tool_timeouts::SYNC,
            search: tool_timeouts::SEARCH,
            progress: tool_timeouts::PROGRESS,
            manage: tool_timeouts::MANAGE,
            get: tool_timeouts::GET,
            hierarchy: tool_timeouts::HIERARCHY,
            reorder: tool_timeouts::REORDER,
        }
    }
}

impl ToolTimeouts {
    fn from_env() -> Self {
        fn secs(var: &str, default: Duration) -> Duration {
            std::env::var(var)
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(default)
        }

        let d = Self::default();
        Self {
            execute: secs("JIVE_TOOLS_EXECUTE_TIMEOUT_SECONDS", d.execute),
            sync: secs("JIVE_TOOLS_SYNC_TIMEOUT_SECONDS", d.sync),
            search: secs("JIVE_TOOLS_SEARCH_TIMEOUT_SECONDS", d.search),
            progress: secs("JIVE_TOOLS_PROGRESS_TIMEOUT_SECONDS", d.progress),
            manage: secs("JIVE_TOOLS_MANAGE_TIMEOUT_SECONDS", d.manage),
            get: secs("JIVE_TOOLS_GET_TIMEOUT_SECONDS", d.get),
            hierarchy: secs("JIVE_TOOLS_HIERARCHY_TIMEOUT_SECONDS", d.hierarchy),
            reorder: secs("JIVE_TOOLS_REORDER_TIMEOUT_SECONDS", d.reorder),
        }
    }

    /// Timeout budget for a unified tool name.
    #[must_use]
    pub fn for_tool(&self, tool_name: &str) -> Duration {
        match tool_name {
            "jive_execute_work_item" => self.execute,
            "jive_sync_data" => self.sync,
            "jive_search_content" => self.search,
            "jive_track_progress" => self.progress,
            "jive_manage_work_item" => self.manage,
            "jive_get_work_item" => self.get,
            "jive_get_hierarchy" => self.hierarchy,
            "jive_reorder_work_items" => self.reorder,
            _ => self.manage,
        }
    }
}

/// Server-wide configuration (spec §6.3).
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP bind host.
    pub host: String,
    /// HTTP bind port.
    pub port: u16,
    /// `tracing` filter directive, e.g. "info".
    pub log_level: String,
    /// Storage root (spec §6.4); `default` namespace lives at its root.
    pub data_path: std::path::PathBuf,
    /// Name of the embedding model (opaque to this server).
    pub embedding_model: String,
    /// Fallback namespace label (spec §4.3.3 step 4).
    pub default_namespace: String,
    /// Auto-create unknown namespaces on first reference.
    pub auto_create_namespaces: bool,
    /// Allowed CORS origins for the HTTP transport.
    pub cors_origins: Vec<String>,
    /// Per-tool timeout budgets.
    pub tool_timeouts: ToolTimeouts,
}

impl Config {
    /// Load configuration from environment variables, falling back to
    /// sensible defaults for everything unset.
    ///
    /// # Errors
    ///
    /// Returns an error if `JIVE_SERVER_PORT` is set but not a valid u16.
    pub fn from_env() -> anyhow::Result<Self> {
        let port = match std::env::var("JIVE_SERVER_PORT") {
            Ok(v) => v.parse::<u16>()?,
            Err(_) => 8765,
        };

        Ok(Self {
            host: std::env::var("JIVE_SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port,
            log_level: std::env::var("JIVE_SERVER_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            data_path: std::env::var("JIVE_DATABASE_DATA_PATH")
                .map(std::path::PathBuf::from)
                .unwrap_or_else(|_| std::path::PathBuf::from("./data/jive")),
            embedding_model: std::env::var("JIVE_DATABASE_EMBEDDING_MODEL")
                .unwrap_or_else(|_| "local-hash-384".to_string()),
            default_namespace: std::env::var("JIVE_NAMESPACE_DEFAULT")
                .unwrap_or_else(|_| "default".to_string()),
            auto_create_namespaces: std::env::var("JIVE_NAMESPACE_AUTO_CREATE")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(true),
            cors_origins: std::env::var("JIVE_SECURITY_CORS_ORIGINS")
                .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_else(|_| vec!["*".to_string()]),
            tool_timeouts: ToolTimeouts::from_env(),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8765,
            log_level: "info".to_string(),
            data_path: std::path::PathBuf::from("./data/jive"),
            embedding_model: "local-hash-384".to_string(),
            default_namespace: "default".to_string(),
            auto_create_namespaces: true,
            cors_origins: vec!["*".to_string()],
            tool_timeouts: ToolTimeouts::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_timeouts_match_spec_table() {
        let t = ToolTimeouts::default();
        assert_eq!(t.for_tool("jive_execute_work_item"), Duration::from_secs(300));
        assert_eq!(t.for_tool("jive_sync_data"), Duration::from_secs(120));
        assert_eq!(t.for_tool("jive_search_content"), Duration::from_secs(30));
        assert_eq!(t.for_tool("jive_track_progress"), Duration::from_secs(90));
        assert_eq!(t.for_tool("jive_manage_work_item"), Duration::from_secs(60));
        assert_eq!(t.for_tool("jive_get_work_item"), Duration::from_secs(30));
        assert_eq!(t.for_tool("jive_get_hierarchy"), Duration::from_secs(60));
        assert_eq!(t.for_tool("jive_reorder_work_items"), Duration::from_secs(30));
    }

    #[test]
    fn config_default_uses_default_namespace() {
        let c = Config::default();
        assert_eq!(c.default_namespace, "default");
        assert!(c.auto_create_namespaces);
    }
}
