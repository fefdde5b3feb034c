//! One task per session.
//!
//! The task owns the [`Session`] and takes commands from a FIFO queue, so
//! handshake transitions apply in arrival order. Tool calls are spawned off
//! the task and report back through a `JoinSet`, which lets later requests
//! on the same session proceed while a handler is still running.

use std::sync::Arc;

use gurddy_core::SessionId;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;

use crate::dispatch::{Dispatcher, Route};
use crate::jsonrpc::{decode, RequestId};
use crate::session::Session;
use crate::transport::{
    collect_buffered, frame_channel, DeliveryMode, Frame, FrameStream, Outcome, TransportError,
};

/// Commands queued per session before senders wait.
const COMMAND_BUFFER: usize = 32;

enum Command {
    Exchange {
        raw: Vec<u8>,
        mode: DeliveryMode,
        reply: oneshot::Sender<Option<FrameStream>>,
    },
    Close {
        done: oneshot::Sender<()>,
    },
}

/// Cheap, cloneable handle to a running session task.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: SessionId,
    tx: mpsc::Sender<Command>,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exchange { mode, .. } => f.debug_struct("Exchange").field("mode", mode).finish(),
            Self::Close { .. } => f.write_str("Close"),
        }
    }
}

impl SessionHandle {
    /// Start a fresh, uninitialized session on its own task.
    #[must_use]
    pub fn spawn(dispatcher: Arc<Dispatcher>) -> Self {
        let session = dispatcher.new_session();
        let id = session.id();
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        tokio::spawn(run(dispatcher, session, rx));
        tracing::debug!(session = %id, "session task started");
        Self { id, tx }
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Run one raw message through the session.
    ///
    /// Buffered exchanges resolve to the terminal response only; streaming
    /// exchanges hand back the frame stream as soon as the request has been
    /// routed.
    pub async fn exchange(
        &self,
        raw: Vec<u8>,
        mode: DeliveryMode,
    ) -> Result<Outcome, TransportError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Exchange { raw, mode, reply })
            .await
            .map_err(|_| TransportError::Closed)?;

        let Some(frames) = rx.await.map_err(|_| TransportError::Closed)? else {
            return Ok(Outcome::Accepted);
        };

        match mode {
            DeliveryMode::Buffered => collect_buffered(frames).await.map(Outcome::Buffered),
            DeliveryMode::Streaming => Ok(Outcome::Streaming(frames)),
        }
    }

    /// Close the session. Tool calls already running finish on their own;
    /// their results are discarded if nobody is reading.
    pub async fn close(&self) {
        let (done, rx) = oneshot::channel();
        if self.tx.send(Command::Close { done }).await.is_ok() {
            let _ = rx.await;
        }
    }
}

async fn run(dispatcher: Arc<Dispatcher>, mut session: Session, mut rx: mpsc::Receiver<Command>) {
    let mut calls: JoinSet<RequestId> = JoinSet::new();

    loop {
        tokio::select! {
            biased;

            Some(done) = calls.join_next(), if !calls.is_empty() => match done {
                Ok(id) => session.complete(id),
                Err(e) => {
                    tracing::warn!(session = %session.id(), error = %e, "tool call task lost");
                }
            },

            cmd = rx.recv() => match cmd {
                Some(Command::Exchange { raw, mode, reply }) => {
                    let frames = exchange(&dispatcher, &mut session, &mut calls, &raw, mode);
                    let _ = reply.send(frames);
                }
                Some(Command::Close { done }) => {
                    session.close();
                    let _ = done.send(());
                    break;
                }
                None => {
                    session.close();
                    break;
                }
            },
        }
    }

    tracing::debug!(session = %session.id(), pending = calls.len(), "session task stopped");
    calls.detach_all();
}

fn exchange(
    dispatcher: &Dispatcher,
    session: &mut Session,
    calls: &mut JoinSet<RequestId>,
    raw: &[u8],
    mode: DeliveryMode,
) -> Option<FrameStream> {
    let (sink, frames) = frame_channel();

    let inbound = match decode(raw) {
        Ok(inbound) => inbound,
        Err(rejection) => {
            tracing::debug!(
                session = %session.id(),
                error = %rejection.error,
                "undecodable message"
            );
            sink.emit_now(Frame::Response(rejection.into_response()));
            return Some(frames);
        }
    };

    match dispatcher.route(session, inbound) {
        Route::Accepted => None,
        Route::Reply(resp) => {
            sink.emit_now(Frame::Response(resp));
            Some(frames)
        }
        Route::Call(invocation) => {
            calls.spawn(invocation.run(sink, mode));
            Some(frames)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jsonrpc::{JsonRpcResponse, PARSE_ERROR};
    use crate::session::ServerIdentity;
    use crate::tools::tests::{CountingHandler, StubResolver, QUEENS_PARAMS};
    use crate::tools::ToolRegistry;
    use async_trait::async_trait;
    use gurddy_core::{
        Arguments, HandlerError, HandlerParam, ParamDecl, ParamType, ToolDecl, ToolHandler,
    };
    use serde_json::{json, Value};
    use tokio::sync::Notify;
    use tokio_stream::StreamExt;

    /// Handler that blocks until released.
    struct GateHandler(Arc<Notify>);

    #[async_trait]
    impl ToolHandler for GateHandler {
        fn parameters(&self) -> &'static [HandlerParam] {
            &[]
        }

        async fn invoke(&self, _args: Arguments) -> Result<Value, HandlerError> {
            self.0.notified().await;
            Ok(json!({"success": true}))
        }
    }

    const TOOLS: &[ToolDecl] = &[
        ToolDecl {
            name: "solve_n_queens",
            description: "",
            category: "classic",
            handler_ref: "queens",
            params: &[ParamDecl {
                name: "n",
                ty: ParamType::Integer,
                required: false,
                description: "",
            }],
        },
        ToolDecl {
            name: "slow",
            description: "",
            category: "test",
            handler_ref: "slow",
            params: &[],
        },
    ];

    fn handle(gate: &Arc<Notify>) -> SessionHandle {
        let resolver = StubResolver::default()
            .with("queens", CountingHandler::new(QUEENS_PARAMS))
            .with("slow", Arc::new(GateHandler(Arc::clone(gate))));
        let registry = ToolRegistry::build(TOOLS, &resolver).unwrap();
        SessionHandle::spawn(Arc::new(Dispatcher::new(
            Arc::new(registry),
            ServerIdentity::new("gurddy-mcp", "0.1.0"),
        )))
    }

    async fn buffered(handle: &SessionHandle, msg: Value) -> JsonRpcResponse {
        match handle
            .exchange(msg.to_string().into_bytes(), DeliveryMode::Buffered)
            .await
            .unwrap()
        {
            Outcome::Buffered(resp) => resp,
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    async fn ready(handle: &SessionHandle) {
        buffered(
            handle,
            json!({
                "jsonrpc": "2.0", "id": 1, "method": "initialize",
                "params": {"protocolVersion": "2025-03-26", "capabilities": {}}
            }),
        )
        .await;
        let note = handle
            .exchange(
                json!({"jsonrpc": "2.0", "method": "notifications/initialized"})
                    .to_string()
                    .into_bytes(),
                DeliveryMode::Buffered,
            )
            .await
            .unwrap();
        assert!(matches!(note, Outcome::Accepted));
    }

    #[tokio::test]
    async fn handshake_then_call() {
        let handle = handle(&Arc::new(Notify::new()));
        ready(&handle).await;

        let resp = buffered(
            &handle,
            json!({
                "jsonrpc": "2.0", "id": 2, "method": "tools/call",
                "params": {"name": "solve_n_queens", "arguments": {"n": 8}}
            }),
        )
        .await;
        assert_eq!(resp.id, Some(RequestId(2)));
        assert_eq!(resp.result.unwrap()["content"][0]["type"], "text");
    }

    #[tokio::test]
    async fn malformed_json_gets_parse_error_with_null_id() {
        let handle = handle(&Arc::new(Notify::new()));
        let outcome = handle
            .exchange(b"{not json".to_vec(), DeliveryMode::Buffered)
            .await
            .unwrap();
        let Outcome::Buffered(resp) = outcome else {
            panic!("expected a response");
        };
        assert_eq!(resp.id, None);
        assert_eq!(resp.error.unwrap().code, PARSE_ERROR);
    }

    #[tokio::test]
    async fn slow_call_does_not_block_other_requests() {
        let gate = Arc::new(Notify::new());
        let handle = handle(&gate);
        ready(&handle).await;

        let outcome = handle
            .exchange(
                json!({
                    "jsonrpc": "2.0", "id": 3, "method": "tools/call",
                    "params": {"name": "slow"}
                })
                .to_string()
                .into_bytes(),
                DeliveryMode::Streaming,
            )
            .await
            .unwrap();
        let Outcome::Streaming(mut frames) = outcome else {
            panic!("expected a stream");
        };
        let first = frames.next().await.unwrap();
        assert!(!first.is_terminal());

        let ping = buffered(&handle, json!({"jsonrpc": "2.0", "id": 4, "method": "ping"})).await;
        assert_eq!(ping.result, Some(json!({})));

        gate.notify_one();
        let last = frames.next().await.unwrap().into_response().unwrap();
        assert_eq!(last.id, Some(RequestId(3)));
        assert!(frames.next().await.is_none());
    }

    #[tokio::test]
    async fn ids_of_running_calls_are_not_reused() {
        let gate = Arc::new(Notify::new());
        let handle = handle(&gate);
        ready(&handle).await;

        let outcome = handle
            .exchange(
                json!({
                    "jsonrpc": "2.0", "id": 7, "method": "tools/call",
                    "params": {"name": "slow"}
                })
                .to_string()
                .into_bytes(),
                DeliveryMode::Streaming,
            )
            .await
            .unwrap();
        let Outcome::Streaming(frames) = outcome else {
            panic!("expected a stream");
        };

        for method in ["ping", "tools/list"] {
            let resp =
                buffered(&handle, json!({"jsonrpc": "2.0", "id": 7, "method": method})).await;
            assert_eq!(resp.id, Some(RequestId(7)));
            assert_eq!(resp.result, None, "{method}");
            assert_eq!(resp.error.unwrap().code, crate::jsonrpc::INVALID_REQUEST, "{method}");
        }

        gate.notify_one();
        let resp = crate::transport::collect_buffered(frames).await.unwrap();
        assert_eq!(resp.id, Some(RequestId(7)));
        assert!(resp.error.is_none());
    }

    #[tokio::test]
    async fn closed_session_refuses_exchanges() {
        let handle = handle(&Arc::new(Notify::new()));
        ready(&handle).await;
        handle.close().await;

        assert!(handle.is_closed());
        let err = handle
            .exchange(
                json!({"jsonrpc": "2.0", "id": 5, "method": "ping"})
                    .to_string()
                    .into_bytes(),
                DeliveryMode::Buffered,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Closed));
    }

    #[tokio::test]
    async fn sessions_are_independent() {
        let gate = Arc::new(Notify::new());
        let a = handle(&gate);
        let b = handle(&gate);
        ready(&a).await;

        assert_ne!(a.id(), b.id());
        let resp = buffered(&b, json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"})).await;
        assert_eq!(resp.error.unwrap().code, crate::jsonrpc::NOT_INITIALIZED);
    }
}
