use std::convert::Infallible;

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::sse::{Event, KeepAlive},
    response::{IntoResponse, Response, Sse},
    Json,
};
use gurddy_core::SessionId;
use gurddy_mcp::session::LATEST_PROTOCOL_VERSION;
use gurddy_mcp::{
    DeliveryMode, Frame, JsonRpcResponse, McpError, Outcome, SessionHandle, TransportError,
};
use serde_json::{json, Value};
use tokio_stream::{Stream, StreamExt};

use crate::app_state::AppState;

/// Header carrying the session id in both directions.
pub const SESSION_HEADER: &str = "mcp-session-id";

const STREAM_HEADER: &str = "x-stream";

/// One JSON-RPC exchange over `POST /mcp`.
///
/// Without a session header a fresh session is started. It is kept, and
/// its id returned, only if the exchange produced a non-error reply.
pub async fn mcp_request(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let mode = DeliveryMode::negotiate(
        header_str(&headers, header::ACCEPT.as_str()),
        header_str(&headers, STREAM_HEADER),
    );

    let (handle, fresh) = match session_id(&headers) {
        None => (state.sessions.start(), true),
        Some(Some(id)) => match state.sessions.get(id).await {
            Some(handle) => (handle, false),
            None => return session_closed(),
        },
        Some(None) => return session_closed(),
    };

    let outcome = match handle.exchange(body.to_vec(), mode).await {
        Ok(outcome) => outcome,
        Err(TransportError::Closed) => return session_closed(),
        Err(e) => {
            tracing::error!(session = %handle.id(), error = %e, "exchange failed");
            let body = JsonRpcResponse::failure(None, &McpError::Internal(e.to_string()));
            return (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response();
        }
    };

    if !fresh {
        return respond(outcome, Some(&handle));
    }

    // A fresh session is never Ready, so its first frame is the terminal one.
    match outcome {
        Outcome::Streaming(mut frames) => {
            let first = frames.next().await;
            let reply = match &first {
                Some(Frame::Response(resp)) => Some(resp),
                _ => None,
            };
            let kept = keep_fresh(&state, &handle, reply).await;
            let events = sse(tokio_stream::iter(first).chain(frames)).into_response();
            with_session(events, kept.then_some(&handle))
        }
        outcome => {
            let reply = match &outcome {
                Outcome::Buffered(resp) => Some(resp),
                _ => None,
            };
            let kept = keep_fresh(&state, &handle, reply).await;
            respond(outcome, kept.then_some(&handle))
        }
    }
}

/// Register a fresh session if its first reply succeeded, otherwise stop it.
async fn keep_fresh(
    state: &AppState,
    handle: &SessionHandle,
    reply: Option<&JsonRpcResponse>,
) -> bool {
    if reply.is_some_and(|resp| resp.error.is_none()) {
        state.sessions.register(handle.clone()).await;
        true
    } else {
        handle.close().await;
        false
    }
}

/// `DELETE /mcp`: close the header's session.
pub async fn mcp_close(State(state): State<AppState>, headers: HeaderMap) -> Response {
    match session_id(&headers) {
        None => (StatusCode::BAD_REQUEST, "missing Mcp-Session-Id header").into_response(),
        Some(Some(id)) if state.sessions.close(id).await => StatusCode::NO_CONTENT.into_response(),
        Some(_) => session_closed(),
    }
}

/// `GET /`: what this server is and which tools it serves.
pub async fn server_info(State(state): State<AppState>) -> Json<Value> {
    let identity = state.dispatcher.identity();
    Json(json!({
        "name": identity.name,
        "version": identity.version,
        "protocolVersion": LATEST_PROTOCOL_VERSION,
        "tools": state.dispatcher.registry().names(),
    }))
}

fn respond(outcome: Outcome, session: Option<&SessionHandle>) -> Response {
    let response = match outcome {
        Outcome::Accepted => StatusCode::ACCEPTED.into_response(),
        Outcome::Buffered(resp) => Json(resp).into_response(),
        Outcome::Streaming(frames) => sse(frames).into_response(),
    };
    with_session(response, session)
}

fn with_session(mut response: Response, session: Option<&SessionHandle>) -> Response {
    if let Some(value) = session.and_then(|h| HeaderValue::from_str(&h.id().to_string()).ok()) {
        response.headers_mut().insert(SESSION_HEADER, value);
    }
    response
}

fn sse(
    frames: impl Stream<Item = Frame> + Send + 'static,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let events = frames.map(|frame| {
        Ok(Event::default()
            .event("message")
            .json_data(&frame)
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "frame not serializable");
                Event::default().event("error").data(e.to_string())
            }))
    });
    Sse::new(events).keep_alive(KeepAlive::default())
}

fn session_closed() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(JsonRpcResponse::failure(None, &McpError::SessionClosed)),
    )
        .into_response()
}

/// `None` without a header, `Some(None)` for an unparseable one.
fn session_id(headers: &HeaderMap) -> Option<Option<SessionId>> {
    header_str(headers, SESSION_HEADER).map(|raw| raw.trim().parse().ok())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
