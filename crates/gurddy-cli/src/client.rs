use gurddy_mcp::correlator::{extract_result, PendingCall};
use gurddy_mcp::{ClientError, Correlator, Frame, JsonRpcRequest, JsonRpcResponse};
use reqwest::{Client, RequestBuilder, StatusCode};
use reqwest_eventsource::{retry, Event, EventSource};
use serde_json::{json, Value};
use tokio_stream::StreamExt;

const SESSION_HEADER: &str = "Mcp-Session-Id";
const PROTOCOL_VERSION: &str = "2025-06-18";

/// One MCP session against a gurddy server.
pub struct McpClient {
    http: Client,
    endpoint: String,
    session: Option<String>,
    correlator: Correlator,
}

impl McpClient {
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self {
            http: Client::new(),
            endpoint: format!("{}/mcp", base_url.trim_end_matches('/')),
            session: None,
            correlator: Correlator::new(),
        }
    }

    #[must_use]
    pub fn session(&self) -> Option<&str> {
        self.session.as_deref()
    }

    /// Run the two-phase handshake and remember the session id.
    pub async fn initialize(&mut self) -> anyhow::Result<Value> {
        let (request, pending) = self.correlator.next_request(
            "initialize",
            Some(json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {},
                "clientInfo": {"name": "gurddy-cli", "version": env!("CARGO_PKG_VERSION")}
            })),
        );

        let resp = self.send(&request, pending.id()).await?;
        if let Some(id) = resp
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            tracing::debug!(session = id, "session opened");
            self.session = Some(id.to_string());
        }
        let result = self.settle(resp, pending).await?;

        let note = JsonRpcRequest::notification("notifications/initialized", None);
        let resp = self.post(&note).send().await?;
        if resp.status() != StatusCode::ACCEPTED {
            anyhow::bail!("initialized notification refused: HTTP {}", resp.status());
        }
        Ok(result)
    }

    pub async fn list_tools(&self) -> anyhow::Result<Vec<Value>> {
        let result = self.request("tools/list", None).await?;
        Ok(result
            .get("tools")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default())
    }

    /// Call a tool and decode the JSON inside its single text item.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Value,
        stream: bool,
    ) -> anyhow::Result<Value> {
        let params = Some(json!({ "name": name, "arguments": arguments }));
        let result = if stream {
            self.request_streaming("tools/call", params).await?
        } else {
            self.request("tools/call", params).await?
        };

        let text = result
            .pointer("/content/0/text")
            .and_then(Value::as_str)
            .ok_or_else(|| ClientError::Protocol("tool result has no text content".to_string()))?;
        Ok(serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string())))
    }

    /// Ask the server to close the session.
    pub async fn close(&mut self) -> anyhow::Result<()> {
        let Some(session) = self.session.take() else {
            return Ok(());
        };
        let resp = self
            .http
            .delete(&self.endpoint)
            .header(SESSION_HEADER, &session)
            .send()
            .await?;
        tracing::debug!(session, status = %resp.status(), "session closed");
        Ok(())
    }

    /// Buffered exchange: one JSON response per request.
    pub async fn request(&self, method: &str, params: Option<Value>) -> anyhow::Result<Value> {
        let (request, pending) = self.correlator.next_request(method, params);
        let resp = self.send(&request, pending.id()).await?;
        Ok(self.settle(resp, pending).await?)
    }

    /// Streaming exchange: SSE frames until the terminal response.
    ///
    /// Progress notifications are logged. Any transport or decoding failure
    /// fails the whole exchange.
    pub async fn request_streaming(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> anyhow::Result<Value> {
        let (request, pending) = self.correlator.next_request(method, params);
        let id = pending.id();

        let builder = self.post(&request).header("X-Stream", "true");
        let mut es = EventSource::new(builder)?;
        es.set_retry_policy(Box::new(retry::Never));

        while let Some(event) = es.next().await {
            let frame = match event {
                Ok(Event::Open) => continue,
                Ok(Event::Message(msg)) => serde_json::from_str::<Frame>(&msg.data),
                Err(reqwest_eventsource::Error::StreamEnded) => break,
                Err(e) => {
                    es.close();
                    self.correlator.abandon(id);
                    return Err(ClientError::Transport(e.to_string()).into());
                }
            };

            match frame {
                Ok(Frame::Notification(note)) => {
                    let message = note
                        .params
                        .as_ref()
                        .and_then(|p| p.get("message"))
                        .and_then(Value::as_str)
                        .unwrap_or_default();
                    tracing::info!(method = %note.method, message, "progress");
                }
                Ok(Frame::Response(resp)) => {
                    es.close();
                    return Ok(self.resolve(resp, pending).await?);
                }
                Err(e) => {
                    es.close();
                    self.correlator.abandon(id);
                    return Err(ClientError::Protocol(format!("bad frame: {e}")).into());
                }
            }
        }

        self.correlator.abandon(id);
        Err(ClientError::Protocol("stream ended without a response".to_string()).into())
    }

    fn post(&self, body: &JsonRpcRequest) -> RequestBuilder {
        let builder = self.http.post(&self.endpoint).json(body);
        match &self.session {
            Some(session) => builder.header(SESSION_HEADER, session),
            None => builder,
        }
    }

    async fn send(
        &self,
        request: &JsonRpcRequest,
        id: gurddy_mcp::RequestId,
    ) -> Result<reqwest::Response, ClientError> {
        self.post(request).send().await.map_err(|e| {
            self.correlator.abandon(id);
            ClientError::Transport(e.to_string())
        })
    }

    async fn settle(
        &self,
        resp: reqwest::Response,
        pending: PendingCall,
    ) -> Result<Value, ClientError> {
        let status = resp.status();
        let body: JsonRpcResponse = match resp.json().await {
            Ok(body) => body,
            Err(e) => {
                self.correlator.abandon(pending.id());
                return Err(ClientError::Transport(format!("HTTP {status}: {e}")));
            }
        };
        self.resolve(body, pending).await
    }

    /// Route a response through the correlator. Responses the server could
    /// not tie to a request (null id) fail the pending call directly.
    async fn resolve(
        &self,
        resp: JsonRpcResponse,
        pending: PendingCall,
    ) -> Result<Value, ClientError> {
        if resp.id.is_none() {
            self.correlator.abandon(pending.id());
            return extract_result(resp);
        }
        let answered = resp.id == Some(pending.id());
        self.correlator.deliver(resp);
        if !answered {
            self.correlator.abandon(pending.id());
        }
        pending.wait().await
    }
}
