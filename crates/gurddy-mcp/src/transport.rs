//! Frame delivery for one exchange.
//!
//! Every request produces a finite sequence of frames: zero or more
//! notifications followed by exactly one terminal response (or nothing at
//! all for a notification). The buffered sink keeps only the terminal
//! response; the streaming sink forwards every frame as it is produced.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

use crate::jsonrpc::{JsonRpcRequest, JsonRpcResponse, RequestId};

/// Frames buffered per exchange before the producer waits for the reader.
const FRAME_BUFFER: usize = 16;

/// One self-contained JSON-RPC envelope delivered within an exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Frame {
    /// Server-initiated message. Listed first so that `untagged` decoding
    /// only picks it for envelopes carrying a `method`.
    Notification(JsonRpcRequest),
    Response(JsonRpcResponse),
}

impl Frame {
    /// Progress note sent ahead of a tool result in streaming mode.
    pub fn progress(request: RequestId, message: impl Into<String>) -> Self {
        Self::Notification(JsonRpcRequest::notification(
            "notifications/progress",
            Some(json!({ "requestId": request, "message": message.into() })),
        ))
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Response(_))
    }

    #[must_use]
    pub fn into_response(self) -> Option<JsonRpcResponse> {
        match self {
            Self::Response(resp) => Some(resp),
            Self::Notification(_) => None,
        }
    }
}

/// How an exchange's frames reach the caller. Chosen out-of-band, never
/// from the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryMode {
    #[default]
    Buffered,
    Streaming,
}

impl DeliveryMode {
    /// Streaming when the caller accepts `text/event-stream` or sends
    /// `X-Stream: true`.
    #[must_use]
    pub fn negotiate(accept: Option<&str>, x_stream: Option<&str>) -> Self {
        let wants_sse = accept.is_some_and(|a| {
            a.split(',')
                .any(|part| part.trim().starts_with("text/event-stream"))
        });
        let flagged = x_stream.is_some_and(|v| v.trim().eq_ignore_ascii_case("true"));
        if wants_sse || flagged {
            Self::Streaming
        } else {
            Self::Buffered
        }
    }
}

/// Lazy, finite, non-restartable sequence of frames for one exchange.
pub type FrameStream = ReceiverStream<Frame>;

/// Producer half of an exchange's delivery channel.
#[derive(Debug, Clone)]
pub struct FrameSink {
    tx: mpsc::Sender<Frame>,
}

impl FrameSink {
    /// Emit a frame, waiting for buffer space. Returns `false` once the
    /// reader has gone away; remaining frames are then discarded.
    pub async fn emit(&self, frame: Frame) -> bool {
        self.tx.send(frame).await.is_ok()
    }

    /// Emit without waiting. Only used for the first frame of a fresh
    /// channel, which always has room.
    pub fn emit_now(&self, frame: Frame) -> bool {
        self.tx.try_send(frame).is_ok()
    }
}

/// Open the delivery channel for one exchange.
#[must_use]
pub fn frame_channel() -> (FrameSink, FrameStream) {
    let (tx, rx) = mpsc::channel(FRAME_BUFFER);
    (FrameSink { tx }, ReceiverStream::new(rx))
}

/// Result of one exchange as seen by a transport.
#[derive(Debug)]
pub enum Outcome {
    /// A notification: nothing will be delivered.
    Accepted,
    /// The terminal response of a buffered exchange.
    Buffered(JsonRpcResponse),
    /// Frames of a streaming exchange, ending with the terminal response.
    Streaming(FrameStream),
}

/// Errors surfaced by a transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("session closed")]
    Closed,

    #[error("exchange ended without a response")]
    Incomplete,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Drain a frame stream, keeping only its terminal response.
pub async fn collect_buffered(mut frames: FrameStream) -> Result<JsonRpcResponse, TransportError> {
    while let Some(frame) = frames.next().await {
        if let Frame::Response(resp) = frame {
            return Ok(resp);
        }
    }
    Err(TransportError::Incomplete)
}
