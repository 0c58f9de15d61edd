//! Transport multiplexer (spec §4.1): stdio, HTTP, and WebSocket all
//! frame JSON-RPC onto the same [`crate::dispatcher::Dispatcher`] and
//! [`crate::session::SessionManager`], grounded on the teacher's
//! `server/mod.rs` split between `stdio.rs` and `transport.rs` — here
//! extended with a third module for the WebSocket transport, which the
//! teacher's own app never needed.

pub mod http;
pub mod stdio;
pub mod websocket;

use std::sync::Arc;

use crate::dispatcher::Dispatcher;
use crate::session::SessionManager;

/// Collaborators shared by the HTTP and WebSocket transports. Stdio owns
/// its own single session and does not need this.
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub sessions: Arc<SessionManager>,
}

impl AppState {
    #[must_use]
    pub fn new(dispatcher: Arc<Dispatcher>, sessions: Arc<SessionManager>) -> Self {
        Self { dispatcher, sessions }
    }
}
