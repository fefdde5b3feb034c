use std::collections::HashMap;
use std::sync::Arc;

use gurddy_core::SessionId;
use gurddy_mcp::{Dispatcher, SessionHandle};
use tokio::sync::RwLock;

/// Live HTTP sessions keyed by their `Mcp-Session-Id`.
pub struct SessionManager {
    dispatcher: Arc<Dispatcher>,
    sessions: RwLock<HashMap<SessionId, SessionHandle>>,
}

impl SessionManager {
    #[must_use]
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            dispatcher,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Start a session without registering it. It becomes addressable once
    /// passed to [`SessionManager::register`].
    #[must_use]
    pub fn start(&self) -> SessionHandle {
        SessionHandle::spawn(Arc::clone(&self.dispatcher))
    }

    pub async fn register(&self, handle: SessionHandle) {
        tracing::info!(session = %handle.id(), "session opened");
        self.sessions.write().await.insert(handle.id(), handle);
    }

    /// Look up a live session. Sessions whose task has stopped are dropped.
    pub async fn get(&self, id: SessionId) -> Option<SessionHandle> {
        let handle = self.sessions.read().await.get(&id).cloned()?;
        if handle.is_closed() {
            self.sessions.write().await.remove(&id);
            return None;
        }
        Some(handle)
    }

    /// Close and forget a session. Returns `false` if it was unknown.
    pub async fn close(&self, id: SessionId) -> bool {
        let Some(handle) = self.sessions.write().await.remove(&id) else {
            return false;
        };
        handle.close().await;
        true
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
