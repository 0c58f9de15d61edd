//! HTTP transport (spec §4.1, §6.1). Grounded on the teacher's
//! `server/transport.rs` (`axum::Router`, SSE via `axum::response::sse`,
//! `Mcp-Session-Id` header handling), extended with `/mcp/{namespace}`,
//! `/tools`, `/tools/execute`, `/namespaces`, `/namespaces/{name}` and
//! bare sessionless requests (spec §4.2 "sessionless mode").

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_stream::wrappers::IntervalStream;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::{websocket, AppState};
use crate::config::{Config, SSE_HEARTBEAT_INTERVAL};
use crate::rpc::JsonRpcRequest;
use crate::session::{Session, TransportKind};

const SESSION_HEADER: &str = "Mcp-Session-Id";

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/tools", get(list_tools))
        .route("/tools/execute", post(execute_tool))
        .route("/namespaces", get(list_namespaces).post(create_namespace))
        .route("/namespaces/{name}", delete(delete_namespace))
        .route("/mcp", get(mcp_get).post(mcp_root_post))
        .route("/mcp/{namespace}", post(mcp_namespaced_post))
        .route("/ws", get(ws_echo))
        .layer(cors_layer(&state.dispatcher.config))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_http(state: Arc<AppState>, config: &Config) -> anyhow::Result<()> {
    let router = create_router(Arc::clone(&state));
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "HTTP transport listening");
    axum::serve(listener, router).with_graceful_shutdown(shutdown_signal()).await?;
    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c().await.expect("failed to install CTRL+C handler");
    tracing::info!("received shutdown signal");
}

fn cors_layer(config: &Config) -> CorsLayer {
    if config.cors_origins.iter().any(|o| o == "*") {
        return CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);
    }
    let origins: Vec<HeaderValue> =
        config.cors_origins.iter().filter_map(|o| HeaderValue::from_str(o).ok()).collect();
    CorsLayer::new().allow_origin(origins).allow_methods(Any).allow_headers(Any)
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let namespaces = state.dispatcher.tool_ctx.namespaces.list().await;
    Json(json!({
        "status": "ok",
        "service": "jive-mcp",
        "version": env!("CARGO_PKG_VERSION"),
        "sessions": state.sessions.session_count().await,
        "tools": state.dispatcher.tools.len(),
        "namespaces": namespaces.len(),
    }))
}

async fn list_tools(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let tools: Vec<Value> = state
        .dispatcher
        .tools
        .iter()
        .map(|t| json!({ "name": t.name(), "description": t.description(), "inputSchema": t.input_schema() }))
        .collect();
    Json(json!({ "tools": tools }))
}

#[derive(Debug, Deserialize)]
struct ExecuteRequest {
    name: String,
    #[serde(default)]
    arguments: Value,
    #[serde(default)]
    namespace: Option<String>,
}

/// Convenience wrapper over `tools/call` (spec §6.1) for callers that
/// would rather not construct a full JSON-RPC envelope.
async fn execute_tool(State(state): State<Arc<AppState>>, Json(body): Json<ExecuteRequest>) -> Response {
    let session = Session::new(uuid::Uuid::new_v4().to_string(), TransportKind::Http);
    let request = JsonRpcRequest {
        jsonrpc: "2.0".to_string(),
        method: "tools/call".to_string(),
        params: json!({ "name": body.name, "arguments": body.arguments }),
        id: Some(json!(1)),
    };
    let response = state.dispatcher.dispatch(&session, body.namespace.as_deref(), request).await;
    Json(response).into_response()
}

async fn list_namespaces(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({ "namespaces": state.dispatcher.tool_ctx.namespaces.list().await }))
}

#[derive(Debug, Deserialize)]
struct CreateNamespaceRequest {
    name: String,
}

async fn create_namespace(State(state): State<Arc<AppState>>, Json(body): Json<CreateNamespaceRequest>) -> Response {
    match state.dispatcher.tool_ctx.namespaces.create(&body.name).await {
        Ok(created) => {
            let status = if created { StatusCode::CREATED } else { StatusCode::OK };
            (status, Json(json!({ "namespace": body.name, "created": created }))).into_response()
        }
        Err(e) => (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() }))).into_response(),
    }
}

async fn delete_namespace(State(state): State<Arc<AppState>>, Path(name): Path<String>) -> Response {
    use crate::namespace::NamespaceError;
    match state.dispatcher.tool_ctx.namespaces.delete(&name).await {
        Ok(()) => {
            state.dispatcher.tool_ctx.stores.evict(&name).await;
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e @ NamespaceError::CannotDelete(_)) => {
            (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() }))).into_response()
        }
        Err(e @ NamespaceError::NotFound(_)) => {
            (StatusCode::NOT_FOUND, Json(json!({ "error": e.to_string() }))).into_response()
        }
        Err(e) => (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() }))).into_response(),
    }
}

async fn session_for_request(state: &AppState, headers: &HeaderMap) -> Result<(Arc<Session>, bool), StatusCode> {
    let header_id = headers.get(SESSION_HEADER).and_then(|v| v.to_str().ok());
    match header_id {
        Some(id) => match state.sessions.get_session(id).await {
            Some(session) => Ok((session, true)),
            None => Err(StatusCode::NOT_FOUND),
        },
        // Sessionless mode (spec §4.2): service as a transient session bound
        // to whatever namespace this request resolves to.
        None => Ok((Arc::new(Session::new(uuid::Uuid::new_v4().to_string(), TransportKind::Http)), false)),
    }
}

async fn mcp_root_post(State(state): State<Arc<AppState>>, headers: HeaderMap, Json(req): Json<JsonRpcRequest>) -> Response {
    handle_mcp_post(state, None, headers, req).await
}

async fn mcp_namespaced_post(
    State(state): State<Arc<AppState>>,
    Path(namespace): Path<String>,
    headers: HeaderMap,
    Json(req): Json<JsonRpcRequest>,
) -> Response {
    handle_mcp_post(state, Some(namespace), headers, req).await
}

async fn handle_mcp_post(
    state: Arc<AppState>,
    url_namespace: Option<String>,
    headers: HeaderMap,
    req: JsonRpcRequest,
) -> Response {
    let is_notification = req.is_notification();
    let is_initialize = req.method == "initialize";

    let (session, registered) = match session_for_request(&state, &headers).await {
        Ok(pair) => pair,
        Err(status) => {
            return (status, Json(json!({ "error": "invalid session" }))).into_response();
        }
    };

    // A fresh session created for this request (either via an explicit
    // `initialize` with no prior header, or sessionless mode) is
    // registered only when the client will be able to carry the header
    // forward, i.e. on `initialize`.
    if !registered && is_initialize {
        state.sessions.register(Arc::clone(&session)).await;
    }

    let response = state.dispatcher.dispatch(&session, url_namespace.as_deref(), req).await;

    match response {
        None => {
            if is_notification {
                StatusCode::NO_CONTENT.into_response()
            } else {
                StatusCode::ACCEPTED.into_response()
            }
        }
        Some(body) => {
            let mut res = Json(body).into_response();
            if let Ok(value) = HeaderValue::from_str(&session.id) {
                res.headers_mut().insert(SESSION_HEADER, value);
            }
            res
        }
    }
}

async fn mcp_get(State(state): State<Arc<AppState>>, headers: HeaderMap, ws: Option<WebSocketUpgrade>) -> Response {
    if let Some(ws) = ws {
        return ws.on_upgrade(move |socket| websocket::handle_mcp_socket(socket, state));
    }
    sse_response(state, headers).await
}

async fn sse_response(state: Arc<AppState>, headers: HeaderMap) -> Response {
    let session_id = headers.get(SESSION_HEADER).and_then(|v| v.to_str().ok());
    let session = match session_id {
        Some(id) => state.sessions.get_session(id).await,
        None => None,
    };
    let session = match session {
        Some(s) => s,
        None => state.sessions.create_session(TransportKind::Http).await,
    };

    let initial = stream::once(async move {
        Ok::<_, Infallible>(
            Event::default()
                .event("message")
                .data(json!({ "jsonrpc": "2.0", "method": "notifications/initialized", "params": {} }).to_string()),
        )
    });

    let heartbeat = IntervalStream::new(tokio::time::interval(SSE_HEARTBEAT_INTERVAL)).skip(1).map(|_| {
        Ok::<_, Infallible>(
            Event::default()
                .event("message")
                .data(json!({ "jsonrpc": "2.0", "method": "notifications/heartbeat", "params": {} }).to_string()),
        )
    });

    let stream: std::pin::Pin<Box<dyn Stream<Item = Result<Event, Infallible>> + Send>> =
        Box::pin(initial.chain(heartbeat));

    let mut response =
        Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)).text("ping")).into_response();
    if let Ok(value) = HeaderValue::from_str(&session.id) {
        response.headers_mut().insert(SESSION_HEADER, value);
    }
    response
}

async fn ws_echo(ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(websocket::handle_echo_socket)
}
