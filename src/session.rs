//! Session manager (spec §3.4, §4.2). Grounded on the teacher's
//! `server/session.rs` "mailbox" pattern (ring-buffer history +
//! broadcast channel, Last-Event-ID replay, background stale-session
//! sweep), extended with the fields the spec's session model adds:
//! `client_info`, `capabilities`, `protocol_version`, `transport`, and
//! `bound_namespace`.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::response::sse::Event;
use tokio::sync::{broadcast, RwLock};

const HISTORY_SIZE: usize = 100;
const SESSION_TIMEOUT: Duration = Duration::from_secs(3600);
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Which transport (spec §3.4) a session was created over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Stdio,
    Http,
    WebSocket,
}

impl TransportKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stdio => "stdio",
            Self::Http => "http",
            Self::WebSocket => "websocket",
        }
    }
}

#[derive(Clone, Debug)]
pub struct BufferedEvent {
    pub id: u64,
    pub event_type: String,
    pub data: String,
    pub created_at: Instant,
}

impl BufferedEvent {
    #[must_use]
    pub fn new(id: u64, event_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self { id, event_type: event_type.into(), data: data.into(), created_at: Instant::now() }
    }

    #[must_use]
    pub fn to_sse_event(&self) -> Event {
        Event::default().id(self.id.to_string()).event(self.event_type.clone()).data(self.data.clone())
    }
}

/// One MCP connection's state (spec §3.4): created on `initialize`,
/// never persisted, gone when the transport closes.
pub struct Session {
    pub id: String,
    pub transport: TransportKind,
    pub protocol_version: RwLock<Option<String>>,
    pub client_info: RwLock<Option<serde_json::Value>>,
    pub capabilities: RwLock<Option<serde_json::Value>>,
    /// Namespace this session is pinned to once it names one explicitly
    /// (spec §4.3.3); `None` until then.
    pub bound_namespace: RwLock<Option<String>>,
    tx: broadcast::Sender<BufferedEvent>,
    history: RwLock<VecDeque<BufferedEvent>>,
    next_event_id: AtomicU64,
    pub created_at: Instant,
    last_active: RwLock<Instant>,
}

impl Session {
    #[must_use]
    pub fn new(id: String, transport: TransportKind) -> Self {
        let (tx, _) = broadcast::channel(64);
        Self {
            id,
            transport,
            protocol_version: RwLock::new(None),
            client_info: RwLock::new(None),
            capabilities: RwLock::new(None),
            bound_namespace: RwLock::new(None),
            tx,
            history: RwLock::new(VecDeque::with_capacity(HISTORY_SIZE)),
            next_event_id: AtomicU64::new(1),
            created_at: Instant::now(),
            last_active: RwLock::new(Instant::now()),
        }
    }

    pub async fn initialize(&self, protocol_version: String, client_info: serde_json::Value, capabilities: serde_json::Value) {
        *self.protocol_version.write().await = Some(protocol_version);
        *self.client_info.write().await = Some(client_info);
        *self.capabilities.write().await = Some(capabilities);
    }

    /// Binds the session to a namespace (spec §4.3.3); a session can
    /// only bind once. Returns `false` if already bound to a different
    /// namespace.
    pub async fn bind_namespace(&self, namespace: &str) -> bool {
        let mut bound = self.bound_namespace.write().await;
        match bound.as_deref() {
            Some(existing) => existing == namespace,
            None => {
                *bound = Some(namespace.to_string());
                true
            }
        }
    }

    pub async fn push_event(&self, event_type: impl Into<String>, data: impl Into<String>) -> u64 {
        let id = self.next_event_id.fetch_add(1, Ordering::SeqCst);
        let event = BufferedEvent::new(id, event_type, data);

        {
            let mut history = self.history.write().await;
            if history.len() >= HISTORY_SIZE {
                history.pop_front();
            }
            history.push_back(event.clone());
        }
        let _ = self.tx.send(event);
        *self.last_active.write().await = Instant::now();
        id
    }

    pub async fn get_events_after(&self, last_event_id: u64) -> Vec<BufferedEvent> {
        let history = self.history.read().await;
        history.iter().filter(|e| e.id > last_event_id).cloned().collect()
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<BufferedEvent> {
        self.tx.subscribe()
    }

    pub async fn is_stale(&self) -> bool {
        self.last_active.read().await.elapsed() > SESSION_TIMEOUT
    }

    pub async fn touch(&self) {
        *self.last_active.write().await = Instant::now();
    }

    #[must_use]
    pub fn current_event_id(&self) -> u64 {
        self.next_event_id.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("transport", &self.transport.as_str())
            .field("current_event_id", &self.current_event_id())
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Process-global session table (spec §5: "process-global, protected by
/// a mutex on insert/delete; lookup is read-mostly").
#[derive(Clone)]
pub struct SessionManager {
    sessions: Arc<RwLock<HashMap<String, Arc<Session>>>>,
}

impl SessionManager {
    #[must_use]
    pub fn new() -> Self {
        Self { sessions: Arc::new(RwLock::new(HashMap::new())) }
    }

    pub async fn create_session(&self, transport: TransportKind) -> Arc<Session> {
        let id = uuid::Uuid::new_v4().to_string();
        let session = Arc::new(Session::new(id.clone(), transport));
        self.sessions.write().await.insert(id, Arc::clone(&session));
        tracing::info!(session_id = %session.id, transport = transport.as_str(), "session created");
        session
    }

    pub async fn get_session(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Registers an already-constructed session (e.g. one built ad hoc by
    /// a transport for a request that arrived without a session header)
    /// so later requests carrying its id can find it.
    pub async fn register(&self, session: Arc<Session>) {
        self.sessions.write().await.insert(session.id.clone(), session);
    }

    pub async fn get_or_create_session(&self, id: Option<&str>, transport: TransportKind) -> Arc<Session> {
        if let Some(id) = id {
            if let Some(session) = self.get_session(id).await {
                session.touch().await;
                return session;
            }
        }
        self.create_session(transport).await
    }

    pub async fn remove_session(&self, id: &str) -> bool {
        let removed = self.sessions.write().await.remove(id).is_some();
        if removed {
            tracing::info!(session_id = %id, "session removed");
        }
        removed
    }

    pub async fn cleanup_stale_sessions(&self) -> usize {
        let mut to_remove = Vec::new();
        {
            let sessions = self.sessions.read().await;
            for (id, session) in sessions.iter() {
                if session.is_stale().await {
                    to_remove.push(id.clone());
                }
            }
        }
        let count = to_remove.len();
        if count > 0 {
            let mut sessions = self.sessions.write().await;
            for id in to_remove {
                sessions.remove(&id);
            }
            tracing::debug!(count, "stale sessions cleaned up");
        }
        count
    }

    #[must_use]
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub fn start_cleanup_task(self: Arc<Self>) {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
            loop {
                interval.tick().await;
                self.cleanup_stale_sessions().await;
            }
        });
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn session_creation_registers_in_manager() {
        let manager = SessionManager::new();
        let session = manager.create_session(TransportKind::Http).await;
        assert!(!session.id.is_empty());
        assert_eq!(manager.session_count().await, 1);
    }

    #[tokio::test]
    async fn event_push_and_replay() {
        let session = Session::new("test".to_string(), TransportKind::Stdio);
        let id1 = session.push_event("message", r#"{"n":1}"#).await;
        session.push_event("message", r#"{"n":2}"#).await;
        let events = session.get_events_after(id1).await;
        assert_eq!(events.len(), 1);
    }

    #[tokio::test]
    async fn namespace_binds_once() {
        let session = Session::new("test".to_string(), TransportKind::Http);
        assert!(session.bind_namespace("team-a").await);
        assert!(session.bind_namespace("team-a").await);
        assert!(!session.bind_namespace("team-b").await);
    }

    #[tokio::test]
    async fn ring_buffer_overflow_evicts_oldest() {
        let session = Session::new("test".to_string(), TransportKind::Http);
        for i in 0..150 {
            session.push_event("message", format!("{{\"n\":{i}}}")).await;
        }
        let events = session.get_events_after(0).await;
        assert_eq!(events.len(), HISTORY_SIZE);
        assert_eq!(events[0].id, 51);
    }
}
