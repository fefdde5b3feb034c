use std::sync::Arc;

use chrono::{DateTime, Utc};
use gurddy_core::{Arguments, ToolHandler};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::McpError;
use crate::jsonrpc::{Inbound, JsonRpcRequest, JsonRpcResponse, RequestId};
use crate::session::{is_initialized_method, ServerIdentity, Session, SessionState};
use crate::tools::{ToolDefinition, ToolRegistry};
use crate::transport::{DeliveryMode, Frame, FrameSink};

/// Parameters for `tools/call`.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolCallParams {
    pub name: String,
    #[serde(default)]
    pub arguments: Option<Value>,
}

/// MCP tool call result wrapper.
#[derive(Debug, Clone, Serialize)]
pub struct ToolResult {
    pub content: Vec<ToolResultContent>,
}

/// A single content block inside a tool result.
#[derive(Debug, Clone, Serialize)]
pub struct ToolResultContent {
    #[serde(rename = "type")]
    pub content_type: String,
    pub text: String,
}

impl ToolResult {
    /// Wrap a handler's return value as exactly one text item holding its
    /// JSON encoding.
    pub fn from_value(value: &Value) -> Result<Self, serde_json::Error> {
        Ok(Self {
            content: vec![ToolResultContent {
                content_type: "text".into(),
                text: serde_json::to_string(value)?,
            }],
        })
    }
}

/// What the session task should do with a decoded request.
#[derive(Debug)]
pub enum Route {
    /// Answer immediately.
    Reply(JsonRpcResponse),
    /// Run a tool handler; the answer follows when it completes.
    Call(Invocation),
    /// A notification. Nothing is sent back.
    Accepted,
}

/// A validated `tools/call`, ready to run.
pub struct Invocation {
    id: RequestId,
    tool: String,
    handler: Arc<dyn ToolHandler>,
    args: Arguments,
    received_at: DateTime<Utc>,
}

impl std::fmt::Debug for Invocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Invocation")
            .field("id", &self.id)
            .field("tool", &self.tool)
            .finish_non_exhaustive()
    }
}

impl Invocation {
    #[must_use]
    pub fn id(&self) -> RequestId {
        self.id
    }

    #[must_use]
    pub fn tool(&self) -> &str {
        &self.tool
    }

    /// Run the handler and deliver its frames into `sink`.
    ///
    /// The handler runs on its own task: if the reader goes away, delivery
    /// stops but the handler still runs to completion.
    pub async fn run(self, sink: FrameSink, mode: DeliveryMode) -> RequestId {
        let Self {
            id,
            tool,
            handler,
            args,
            received_at,
        } = self;

        if mode == DeliveryMode::Streaming
            && !sink.emit(Frame::progress(id, format!("running {tool}"))).await
        {
            tracing::debug!(%id, tool, "reader gone before tool started");
        }

        let joined = tokio::spawn(async move { handler.invoke(args).await }).await;
        let elapsed_ms = (Utc::now() - received_at).num_milliseconds();

        let response = match joined {
            Ok(Ok(value)) => match ToolResult::from_value(&value).and_then(serde_json::to_value) {
                Ok(result) => {
                    tracing::debug!(%id, tool, elapsed_ms, "tool call succeeded");
                    JsonRpcResponse::success(id, result)
                }
                Err(e) => {
                    tracing::error!(%id, tool, error = %e, "tool result not serializable");
                    let err = McpError::Internal(format!(
                        "Tool '{tool}' returned an unserializable result"
                    ));
                    JsonRpcResponse::failure(Some(id), &err)
                }
            },
            Ok(Err(e)) => {
                tracing::warn!(%id, tool, elapsed_ms, error = %e, "tool handler failed");
                JsonRpcResponse::failure(
                    Some(id),
                    &McpError::Internal(format!("Tool '{tool}' failed: {e}")),
                )
            }
            Err(e) => {
                tracing::error!(%id, tool, error = %e, "tool handler panicked");
                JsonRpcResponse::failure(
                    Some(id),
                    &McpError::Internal(format!("Tool '{tool}' failed unexpectedly")),
                )
            }
        };

        if !sink.emit(Frame::Response(response)).await {
            tracing::debug!(%id, tool, "reader gone, tool result discarded");
        }
        id
    }
}

/// Routes decoded requests for one server.
///
/// Holds no per-session state; sessions are passed in by their owner.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
    identity: ServerIdentity,
}

impl Dispatcher {
    #[must_use]
    pub fn new(registry: Arc<ToolRegistry>, identity: ServerIdentity) -> Self {
        Self { registry, identity }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn identity(&self) -> &ServerIdentity {
        &self.identity
    }

    #[must_use]
    pub fn new_session(&self) -> Session {
        Session::new(self.identity.clone())
    }

    /// Decide what to do with one request, applying any handshake
    /// transition immediately.
    pub fn route(&self, session: &mut Session, inbound: Inbound) -> Route {
        let Inbound {
            request,
            received_at,
        } = inbound;

        let Some(id) = request.id else {
            self.notify(session, &request);
            return Route::Accepted;
        };

        tracing::debug!(session = %session.id(), %id, method = %request.method, "request");
        match self.handle(session, id, request, received_at) {
            Ok(route) => route,
            Err(err) => {
                tracing::debug!(session = %session.id(), %id, error = %err, "request rejected");
                Route::Reply(JsonRpcResponse::failure(Some(id), &err))
            }
        }
    }

    fn handle(
        &self,
        session: &mut Session,
        id: RequestId,
        request: JsonRpcRequest,
        received_at: DateTime<Utc>,
    ) -> Result<Route, McpError> {
        session.authorize(&request.method)?;
        session.check_unused(id)?;

        let reply = |result: Value| Ok(Route::Reply(JsonRpcResponse::success(id, result)));
        match request.method.as_str() {
            "initialize" => reply(session.initialize(request.params)?),
            m if is_initialized_method(m) => {
                session.confirm();
                reply(json!({}))
            }
            "ping" => reply(json!({})),
            "tools/list" => reply(self.tools_list()),
            "tools/call" => self
                .prepare_call(session, id, request.params, received_at)
                .map(Route::Call),
            other => Err(McpError::MethodNotFound(other.to_string())),
        }
    }

    fn notify(&self, session: &mut Session, request: &JsonRpcRequest) {
        let method = request.method.as_str();
        match session.state() {
            SessionState::Initializing if is_initialized_method(method) => {
                session.confirm();
            }
            SessionState::Ready => {
                tracing::debug!(session = %session.id(), method, "notification ignored");
            }
            state => {
                tracing::warn!(session = %session.id(), method, ?state, "notification dropped");
            }
        }
    }

    fn tools_list(&self) -> Value {
        let tools: Vec<&ToolDefinition> = self.registry.list().collect();
        json!({ "tools": tools })
    }

    fn prepare_call(
        &self,
        session: &mut Session,
        id: RequestId,
        params: Option<Value>,
        received_at: DateTime<Utc>,
    ) -> Result<Invocation, McpError> {
        let params: ToolCallParams = params
            .ok_or_else(|| McpError::InvalidParams("missing params".to_string()))
            .and_then(|p| {
                serde_json::from_value(p).map_err(|e| McpError::InvalidParams(e.to_string()))
            })?;

        let tool = self.registry.lookup(&params.name)?;
        let args = tool.definition.input_schema.validate(params.arguments)?;
        session.begin(id)?;

        Ok(Invocation {
            id,
            tool: tool.definition.name.clone(),
            handler: Arc::clone(&tool.handler),
            args,
            received_at,
        })
    }
}
