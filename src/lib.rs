//! `jive-mcp`: an MCP server exposing a fixed catalogue of work-item
//! management tools to AI agents over stdio, HTTP, and WebSocket
//! transports (spec §1). The library crate wires together the protocol
//! surface (`rpc`, `dispatcher`, `session`, `transport`), the seven
//! unified tools (`tools`) over the work-item/search/progress engines
//! (`engine`, `search`), the namespace-isolated embedded store
//! (`namespace`, `store`), and the data model (`models`) they all share.
//! `main.rs` is a thin CLI shell around this crate, grounded on the
//! teacher's `main.rs`/`lib.rs` split.

pub mod config;
pub mod dispatcher;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod models;
pub mod namespace;
pub mod rpc;
pub mod search;
pub mod session;
pub mod store;
pub mod tools;
pub mod transport;

use std::sync::Arc;

use config::Config;
use dispatcher::Dispatcher;
use namespace::NamespaceManager;
use session::SessionManager;
use store::StoreRegistry;
use tools::ToolContext;

/// Assembles the process-wide collaborators (namespace manager, store
/// registry, tool registry, dispatcher, session manager) from a loaded
/// [`Config`]. Shared by `main.rs` across whichever transports are
/// enabled (spec §4.1: "All transports share the same dispatcher and
/// tool registry").
///
/// # Errors
///
/// Returns an error if the namespace manager cannot create its storage
/// root (e.g. permission denied on `data_path`).
pub fn build_dispatcher(config: Config) -> anyhow::Result<(Arc<Dispatcher>, Arc<SessionManager>)> {
    let namespaces = Arc::new(NamespaceManager::new(
        &config.data_path,
        &config.default_namespace,
        config.auto_create_namespaces,
    )?);
    let stores = Arc::new(StoreRegistry::new(Arc::clone(&namespaces)));
    let tool_ctx = ToolContext::new(stores, namespaces, config.embedding_model.clone());
    let tools = tools::register_all_tools();
    let dispatcher = Arc::new(Dispatcher::new(tools, tool_ctx, config));
    let sessions = Arc::new(SessionManager::new());
    Ok((dispatcher, sessions))
}
