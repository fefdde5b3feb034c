use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::McpError;

pub const JSONRPC_VERSION: &str = "2.0";

/// Integer id correlating a request with its response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub i64);

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A JSON-RPC 2.0 request. Without an `id` it is a notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(id: RequestId, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Some(id),
            method: method.into(),
            params,
        }
    }

    pub fn notification(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: None,
            method: method.into(),
            params,
        }
    }

    #[must_use]
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// A JSON-RPC 2.0 response.
///
/// `id` is serialized as `null` when the request could not be decoded far
/// enough to recover it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Option<RequestId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Create a success response.
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Some(id),
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response.
    pub fn error(id: Option<RequestId>, code: i32, message: impl Into<String>) -> Self {
        Self::from_error(
            id,
            JsonRpcError {
                code,
                message: message.into(),
                data: None,
            },
        )
    }

    pub fn from_error(id: Option<RequestId>, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }

    pub fn failure(id: Option<RequestId>, error: &McpError) -> Self {
        Self::from_error(id, error.to_rpc_error())
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Standard JSON-RPC error codes.
pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

/// Server-defined error codes.
pub const NOT_INITIALIZED: i32 = -32002;
pub const SESSION_CLOSED: i32 = -32003;
pub const HANDSHAKE_IN_PROGRESS: i32 = -32004;

/// A decoded request stamped with its arrival time.
#[derive(Debug, Clone)]
pub struct Inbound {
    pub request: JsonRpcRequest,
    pub received_at: DateTime<Utc>,
}

/// A raw message that could not be decoded into a request.
#[derive(Debug)]
pub struct Rejection {
    pub id: Option<RequestId>,
    pub error: McpError,
}

impl Rejection {
    #[must_use]
    pub fn into_response(self) -> JsonRpcResponse {
        JsonRpcResponse::failure(self.id, &self.error)
    }
}

/// Decode one raw JSON-RPC envelope.
pub fn decode(raw: &[u8]) -> Result<Inbound, Rejection> {
    let received_at = Utc::now();

    let value: Value = serde_json::from_slice(raw).map_err(|e| Rejection {
        id: None,
        error: McpError::Parse(e.to_string()),
    })?;

    let id = value.get("id").and_then(Value::as_i64).map(RequestId);

    if value.is_array() {
        return Err(Rejection {
            id: None,
            error: McpError::InvalidRequest("batch requests are not supported".to_string()),
        });
    }

    // A present but null id is neither a request nor a notification.
    if value.get("id").is_some_and(Value::is_null) {
        return Err(Rejection {
            id: None,
            error: McpError::InvalidRequest("id must be an integer".to_string()),
        });
    }

    let request: JsonRpcRequest = serde_json::from_value(value).map_err(|e| Rejection {
        id,
        error: McpError::InvalidRequest(e.to_string()),
    })?;

    if request.jsonrpc != JSONRPC_VERSION {
        return Err(Rejection {
            id: request.id,
            error: McpError::InvalidRequest(format!(
                "unsupported jsonrpc version '{}'",
                request.jsonrpc
            )),
        });
    }

    if request.params.as_ref().is_some_and(|p| !p.is_object()) {
        return Err(Rejection {
            id: request.id,
            error: McpError::InvalidRequest("params must be an object".to_string()),
        });
    }

    Ok(Inbound {
        request,
        received_at,
    })
}
