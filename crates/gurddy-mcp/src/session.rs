use std::collections::HashSet;

use gurddy_core::SessionId;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::McpError;
use crate::jsonrpc::RequestId;

/// Protocol versions this server speaks, oldest first.
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2024-11-05", "2025-03-26", "2025-06-18"];

/// Newest supported protocol version, offered when the client asks for an
/// unknown one.
pub const LATEST_PROTOCOL_VERSION: &str = "2025-06-18";

/// Handshake progress of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Initializing,
    Ready,
    Closed,
}

/// What the server says about itself during `initialize`.
#[derive(Debug, Clone)]
pub struct ServerIdentity {
    pub name: String,
    pub version: String,
    pub capabilities: Value,
}

impl ServerIdentity {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            capabilities: json!({ "tools": { "listChanged": false } }),
        }
    }
}

/// MCP `initialize` params.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    pub protocol_version: String,
    #[serde(default)]
    pub capabilities: Value,
    #[serde(default)]
    pub client_info: Option<ClientInfo>,
}

/// Client information sent during `initialize`.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientInfo {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
}

/// Per-connection protocol state.
///
/// Owned by exactly one task; nothing in here is shared.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    state: SessionState,
    protocol_version: Option<String>,
    client_capabilities: Option<Value>,
    client_info: Option<ClientInfo>,
    server: ServerIdentity,
    outstanding: HashSet<RequestId>,
}

impl Session {
    #[must_use]
    pub fn new(server: ServerIdentity) -> Self {
        Self::with_id(SessionId::new(), server)
    }

    #[must_use]
    pub fn with_id(id: SessionId, server: ServerIdentity) -> Self {
        Self {
            id,
            state: SessionState::Uninitialized,
            protocol_version: None,
            client_capabilities: None,
            client_info: None,
            server,
            outstanding: HashSet::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub fn protocol_version(&self) -> Option<&str> {
        self.protocol_version.as_deref()
    }

    #[must_use]
    pub fn client_capabilities(&self) -> Option<&Value> {
        self.client_capabilities.as_ref()
    }

    #[must_use]
    pub fn client_info(&self) -> Option<&ClientInfo> {
        self.client_info.as_ref()
    }

    #[must_use]
    pub fn server(&self) -> &ServerIdentity {
        &self.server
    }

    /// Gate a request (not a notification) by the current state.
    pub fn authorize(&self, method: &str) -> Result<(), McpError> {
        match (self.state, method) {
            (SessionState::Closed, _) => Err(McpError::SessionClosed),
            (SessionState::Uninitialized, "initialize") => Ok(()),
            (SessionState::Uninitialized, _) => Err(McpError::NotInitialized),
            (_, "initialize") => Err(McpError::InvalidRequest(
                "session is already initialized".to_string(),
            )),
            (SessionState::Initializing, m) if is_initialized_method(m) => Ok(()),
            (SessionState::Initializing, _) => Err(McpError::HandshakeInProgress),
            (SessionState::Ready, _) => Ok(()),
        }
    }

    /// First phase of the handshake. Answers with the server's half of the
    /// negotiation and moves to `Initializing`.
    pub fn initialize(&mut self, params: Option<Value>) -> Result<Value, McpError> {
        self.authorize("initialize")?;

        let params: InitializeParams = params
            .ok_or_else(|| McpError::InvalidParams("missing initialize params".to_string()))
            .and_then(|p| {
                serde_json::from_value(p).map_err(|e| McpError::InvalidParams(e.to_string()))
            })?;

        let version = negotiate_version(&params.protocol_version);
        tracing::info!(
            session = %self.id,
            requested = %params.protocol_version,
            negotiated = version,
            client = params.client_info.as_ref().map_or("unknown", |c| c.name.as_str()),
            "initialize"
        );

        self.protocol_version = Some(version.to_string());
        self.client_capabilities = Some(params.capabilities);
        self.client_info = params.client_info;
        self.state = SessionState::Initializing;

        Ok(json!({
            "protocolVersion": version,
            "capabilities": self.server.capabilities,
            "serverInfo": {
                "name": self.server.name,
                "version": self.server.version,
            }
        }))
    }

    /// Second phase of the handshake. Returns `true` if the session moved to
    /// `Ready`.
    pub fn confirm(&mut self) -> bool {
        if self.state == SessionState::Initializing {
            self.state = SessionState::Ready;
            tracing::info!(session = %self.id, "session ready");
            true
        } else {
            false
        }
    }

    /// Terminal transition, valid from any state.
    pub fn close(&mut self) {
        if self.state != SessionState::Closed {
            tracing::info!(session = %self.id, "session closed");
        }
        self.state = SessionState::Closed;
        self.outstanding.clear();
    }

    /// Reject an id that is still in use by an outstanding request.
    pub fn check_unused(&self, id: RequestId) -> Result<(), McpError> {
        if self.outstanding.contains(&id) {
            Err(McpError::InvalidRequest(format!(
                "request id {id} is already in flight"
            )))
        } else {
            Ok(())
        }
    }

    /// Record a request that will be answered later. Ids must be unique
    /// among outstanding requests.
    pub fn begin(&mut self, id: RequestId) -> Result<(), McpError> {
        self.check_unused(id)?;
        self.outstanding.insert(id);
        Ok(())
    }

    pub fn complete(&mut self, id: RequestId) {
        self.outstanding.remove(&id);
    }

    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.outstanding.len()
    }
}

/// `initialized` is also sent under its MCP notification name.
#[must_use]
pub fn is_initialized_method(method: &str) -> bool {
    matches!(method, "initialized" | "notifications/initialized")
}

fn negotiate_version(requested: &str) -> &'static str {
    SUPPORTED_PROTOCOL_VERSIONS
        .iter()
        .find(|v| **v == requested)
        .copied()
        .unwrap_or(LATEST_PROTOCOL_VERSION)
}
