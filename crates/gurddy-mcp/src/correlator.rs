//! Client-side request/response matching.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tokio::sync::oneshot;

use crate::jsonrpc::{JsonRpcRequest, JsonRpcResponse, RequestId};

type PendingTable = HashMap<RequestId, oneshot::Sender<JsonRpcResponse>>;

/// Errors a client sees for one call.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClientError {
    #[error("server error {code}: {message}")]
    Rpc {
        code: i32,
        message: String,
        data: Option<Value>,
    },

    #[error("request abandoned before a response arrived")]
    Abandoned,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Allocates request ids and routes responses back to their callers.
///
/// Ids start at 1 and are never reused within one correlator.
#[derive(Debug)]
pub struct Correlator {
    next_id: AtomicI64,
    pending: Mutex<PendingTable>,
}

impl Default for Correlator {
    fn default() -> Self {
        Self::new()
    }
}

impl Correlator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Build a request with a fresh id and register interest in its
    /// response.
    pub fn next_request(
        &self,
        method: impl Into<String>,
        params: Option<Value>,
    ) -> (JsonRpcRequest, PendingCall) {
        let id = RequestId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = oneshot::channel();
        self.table().insert(id, tx);
        (JsonRpcRequest::new(id, method, params), PendingCall { id, rx })
    }

    /// Hand a response to whoever is waiting for it. Returns `false` for
    /// responses nobody is waiting for; those are logged and dropped.
    pub fn deliver(&self, response: JsonRpcResponse) -> bool {
        let Some(id) = response.id else {
            tracing::warn!(error = ?response.error, "response without id discarded");
            return false;
        };

        let Some(tx) = self.table().remove(&id) else {
            tracing::warn!(%id, "orphan response discarded");
            return false;
        };

        if tx.send(response).is_err() {
            tracing::debug!(%id, "caller stopped waiting");
        }
        true
    }

    /// Stop waiting for one request. Its caller sees [`ClientError::Abandoned`].
    pub fn abandon(&self, id: RequestId) {
        self.table().remove(&id);
    }

    /// Stop waiting for everything, e.g. after the transport failed.
    pub fn abandon_all(&self) {
        self.table().clear();
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        self.table().len()
    }

    fn table(&self) -> MutexGuard<'_, PendingTable> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The receiving end of one registered request.
#[derive(Debug)]
pub struct PendingCall {
    id: RequestId,
    rx: oneshot::Receiver<JsonRpcResponse>,
}

impl PendingCall {
    #[must_use]
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Wait for the response and unwrap its result.
    pub async fn wait(self) -> Result<Value, ClientError> {
        let response = self.rx.await.map_err(|_| ClientError::Abandoned)?;
        extract_result(response)
    }
}

/// Turn a response envelope into its result or a [`ClientError::Rpc`].
pub fn extract_result(response: JsonRpcResponse) -> Result<Value, ClientError> {
    if let Some(err) = response.error {
        return Err(ClientError::Rpc {
            code: err.code,
            message: err.message,
            data: err.data,
        });
    }
    response
        .result
        .ok_or_else(|| ClientError::Protocol("response has neither result nor error".to_string()))
}
