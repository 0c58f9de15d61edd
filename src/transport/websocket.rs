//! WebSocket transport (spec §4.1, §6.1). New relative to the teacher
//! (whose app had no WebSocket transport), grounded on `axum`'s `ws`
//! feature applied the way other MCP servers in the retrieval pack wire
//! an axum WebSocket upgrade into a JSON-RPC loop. Two endpoints:
//! `/mcp` runs full JSON-RPC dispatch (spec §4.3 semantics); `/ws` is a
//! generic echo-ack stream with no protocol semantics.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use serde_json::json;

use super::AppState;
use crate::rpc::JsonRpcRequest;
use crate::session::TransportKind;

/// Runs one WebSocket connection's JSON-RPC session to completion.
/// Closing the socket ends the session (spec §4.1).
pub async fn handle_mcp_socket(mut socket: WebSocket, state: Arc<AppState>) {
    let session = state.sessions.create_session(TransportKind::WebSocket).await;

    while let Some(Ok(message)) = socket.recv().await {
        let text = match message {
            Message::Text(text) => text,
            Message::Close(_) => break,
            Message::Ping(_) | Message::Pong(_) | Message::Binary(_) => continue,
        };

        let request: JsonRpcRequest = match serde_json::from_str(&text) {
            Ok(req) => req,
            Err(e) => {
                let error = crate::rpc::JsonRpcResponse::error(None, -32700, format!("parse error: {e}"));
                if send_json(&mut socket, &error).await.is_err() {
                    break;
                }
                continue;
            }
        };

        if let Some(response) = state.dispatcher.dispatch(&session, None, request).await {
            if send_json(&mut socket, &response).await.is_err() {
                break;
            }
        }
    }

    state.sessions.remove_session(&session.id).await;
    tracing::info!(session_id = %session.id, "websocket session closed");
}

async fn send_json<T: serde::Serialize>(socket: &mut WebSocket, value: &T) -> Result<(), axum::Error> {
    let body = serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string());
    socket.send(Message::Text(body.into())).await
}

/// Generic event-stream endpoint (spec §6.1 `/ws`): acknowledges every
/// text frame it receives without interpreting it as JSON-RPC.
pub async fn handle_echo_socket(mut socket: WebSocket) {
    while let Some(Ok(message)) = socket.recv().await {
        match message {
            Message::Text(text) => {
                let ack = json!({ "type": "ack", "received": text.to_string() }).to_string();
                if socket.send(Message::Text(ack.into())).await.is_err() {
                    break;
                }
            }
            Message::Close(_) => break,
            _ => continue,
        }
    }
}
