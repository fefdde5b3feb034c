//! The `verify` entry point: check every tool schema against its handler,
//! then ask each front-end which tools it actually serves and how it
//! describes them.

use std::sync::Arc;

use anyhow::Context;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue};
use gurddy_mcp::consistency::{self, ConsistencyReport, ListedTool, SurfaceListing};
use gurddy_mcp::correlator::extract_result;
use gurddy_mcp::{Dispatcher, JsonRpcResponse};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::app_state::AppState;
use crate::handlers::{self, SESSION_HEADER};
use crate::stdio;

const PROBE_PROTOCOL_VERSION: &str = "2024-11-05";

/// Run all checks against a freshly built dispatcher.
pub async fn run(dispatcher: Arc<Dispatcher>) -> anyhow::Result<ConsistencyReport> {
    let listings = vec![
        probe_http(Arc::clone(&dispatcher))
            .await
            .context("probing the HTTP front-end")?,
        probe_stdio(Arc::clone(&dispatcher))
            .await
            .context("probing the stdio front-end")?,
    ];
    Ok(consistency::validate(dispatcher.registry(), &listings))
}

fn handshake() -> [Value; 2] {
    [
        json!({
            "jsonrpc": "2.0", "id": 1, "method": "initialize",
            "params": {
                "protocolVersion": PROBE_PROTOCOL_VERSION,
                "capabilities": {},
                "clientInfo": {"name": "gurddy-verify", "version": env!("CARGO_PKG_VERSION")}
            }
        }),
        json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
    ]
}

fn list_request() -> Value {
    json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"})
}

/// Drive the HTTP handler directly, without binding a socket.
async fn probe_http(dispatcher: Arc<Dispatcher>) -> anyhow::Result<SurfaceListing> {
    let state = AppState::new(dispatcher);
    let [init, initialized] = handshake();

    let (session, _) = post(&state, None, &init).await?;
    let session = session.context("initialize did not return a session id")?;
    post(&state, Some(&session), &initialized).await?;
    let (_, body) = post(&state, Some(&session), &list_request()).await?;

    Ok(SurfaceListing {
        surface: "http".to_string(),
        tools: listed_tools(&body)?,
    })
}

async fn post(
    state: &AppState,
    session: Option<&str>,
    message: &Value,
) -> anyhow::Result<(Option<String>, Bytes)> {
    let mut headers = HeaderMap::new();
    if let Some(id) = session {
        headers.insert(SESSION_HEADER, HeaderValue::from_str(id)?);
    }

    let body = Bytes::from(message.to_string());
    let response = handlers::mcp_request(State(state.clone()), headers, body).await;
    let session = response
        .headers()
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = axum::body::to_bytes(response.into_body(), stdio::MAX_MESSAGE_BYTES).await?;
    Ok((session, body))
}

/// Run the stdio loop over an in-memory pipe.
async fn probe_stdio(dispatcher: Arc<Dispatcher>) -> anyhow::Result<SurfaceListing> {
    let (client, server) = tokio::io::duplex(64 * 1024);
    let (server_read, server_write) = tokio::io::split(server);
    let serving = tokio::spawn(stdio::serve(dispatcher, BufReader::new(server_read), server_write));

    let (client_read, mut client_write) = tokio::io::split(client);
    let mut lines = BufReader::new(client_read).lines();

    let mut input = String::new();
    for message in handshake().iter().chain(std::iter::once(&list_request())) {
        input.push_str(&message.to_string());
        input.push('\n');
    }
    client_write.write_all(input.as_bytes()).await?;
    client_write.shutdown().await?;

    let mut last = None;
    while let Some(line) = lines.next_line().await? {
        last = Some(line);
    }
    serving.await??;

    let body = last.context("stdio front-end sent no responses")?;
    Ok(SurfaceListing {
        surface: "stdio".to_string(),
        tools: listed_tools(body.as_bytes())?,
    })
}

fn listed_tools(body: &[u8]) -> anyhow::Result<Vec<ListedTool>> {
    let response: JsonRpcResponse = serde_json::from_slice(body)?;
    let mut result = extract_result(response)?;
    let tools = result
        .get_mut("tools")
        .map(Value::take)
        .context("tools/list result has no tools array")?;
    serde_json::from_value(tools).context("tools/list entries are malformed")
}
