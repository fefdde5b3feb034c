use crate::jsonrpc::{
    JsonRpcError, HANDSHAKE_IN_PROGRESS, INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST,
    METHOD_NOT_FOUND, NOT_INITIALIZED, PARSE_ERROR, SESSION_CLOSED,
};

/// Protocol-level failure of a single exchange.
///
/// Every variant maps onto one JSON-RPC error code; none of them tears the
/// session down.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum McpError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("Server not initialized")]
    NotInitialized,

    #[error("Initialization handshake in progress")]
    HandshakeInProgress,

    #[error("Session closed")]
    SessionClosed,

    #[error("{0}")]
    Internal(String),
}

impl McpError {
    #[must_use]
    pub fn code(&self) -> i32 {
        match self {
            Self::Parse(_) => PARSE_ERROR,
            Self::InvalidRequest(_) => INVALID_REQUEST,
            Self::MethodNotFound(_) | Self::ToolNotFound(_) => METHOD_NOT_FOUND,
            Self::InvalidParams(_) => INVALID_PARAMS,
            Self::NotInitialized => NOT_INITIALIZED,
            Self::HandshakeInProgress => HANDSHAKE_IN_PROGRESS,
            Self::SessionClosed => SESSION_CLOSED,
            Self::Internal(_) => INTERNAL_ERROR,
        }
    }

    #[must_use]
    pub fn to_rpc_error(&self) -> JsonRpcError {
        JsonRpcError {
            code: self.code(),
            message: self.to_string(),
            data: None,
        }
    }
}

impl From<McpError> for JsonRpcError {
    fn from(err: McpError) -> Self {
        err.to_rpc_error()
    }
}
