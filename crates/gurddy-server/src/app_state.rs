use std::sync::Arc;

use gurddy_mcp::Dispatcher;

use crate::session::SessionManager;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub sessions: Arc<SessionManager>,
}

impl AppState {
    #[must_use]
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            sessions: Arc::new(SessionManager::new(Arc::clone(&dispatcher))),
            dispatcher,
        }
    }
}
