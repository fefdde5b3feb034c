//! Newline-delimited JSON-RPC over a byte stream, one session for the
//! lifetime of the stream.

use std::sync::Arc;

use gurddy_mcp::transport::collect_buffered;
use gurddy_mcp::{
    DeliveryMode, Dispatcher, JsonRpcResponse, McpError, Outcome, SessionHandle, TransportError,
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest accepted message, excluding the trailing newline.
pub const MAX_MESSAGE_BYTES: usize = 1024 * 1024;

/// Serve one session until `reader` reaches end of input.
///
/// Messages are handled one at a time; each response is written before the
/// next line is read.
pub async fn serve<R, W>(
    dispatcher: Arc<Dispatcher>,
    mut reader: R,
    mut writer: W,
) -> Result<(), TransportError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let handle = SessionHandle::spawn(dispatcher);
    tracing::info!(session = %handle.id(), "stdio session started");

    let result = pump(&handle, &mut reader, &mut writer).await;
    handle.close().await;
    result
}

async fn pump<R, W>(
    handle: &SessionHandle,
    reader: &mut R,
    writer: &mut W,
) -> Result<(), TransportError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut line = Vec::new();
    loop {
        line.clear();
        let limit = (MAX_MESSAGE_BYTES + 1) as u64;
        let n = (&mut *reader).take(limit).read_until(b'\n', &mut line).await?;
        if n == 0 {
            return Ok(());
        }

        let terminated = line.last() == Some(&b'\n');
        if line.len() - usize::from(terminated) > MAX_MESSAGE_BYTES {
            if !terminated {
                discard_line(reader).await?;
            }
            tracing::warn!(limit = MAX_MESSAGE_BYTES, "oversized message rejected");
            let err = McpError::Parse(format!("message exceeds {MAX_MESSAGE_BYTES} bytes"));
            write_response(writer, &JsonRpcResponse::failure(None, &err)).await?;
            continue;
        }

        let message = line.trim_ascii();
        if message.is_empty() {
            continue;
        }

        let response = match handle.exchange(message.to_vec(), DeliveryMode::Buffered).await {
            Ok(Outcome::Accepted) => continue,
            Ok(Outcome::Buffered(resp)) => resp,
            Ok(Outcome::Streaming(frames)) => collect_buffered(frames).await?,
            Err(TransportError::Incomplete) => JsonRpcResponse::failure(
                None,
                &McpError::Internal("exchange ended without a response".to_string()),
            ),
            Err(e) => return Err(e),
        };
        write_response(writer, &response).await?;
    }
}

/// Skip the rest of an oversized line without buffering it.
async fn discard_line<R: AsyncBufRead + Unpin>(reader: &mut R) -> std::io::Result<()> {
    loop {
        let buf = reader.fill_buf().await?;
        if buf.is_empty() {
            return Ok(());
        }
        if let Some(pos) = buf.iter().position(|b| *b == b'\n') {
            reader.consume(pos + 1);
            return Ok(());
        }
        let len = buf.len();
        reader.consume(len);
    }
}

async fn write_response<W: AsyncWrite + Unpin>(
    writer: &mut W,
    response: &JsonRpcResponse,
) -> std::io::Result<()> {
    let mut bytes = serde_json::to_vec(response)?;
    bytes.push(b'\n');
    writer.write_all(&bytes).await?;
    writer.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use gurddy_mcp::jsonrpc::{INVALID_PARAMS, METHOD_NOT_FOUND, PARSE_ERROR};
    use serde_json::{json, Value};
    use tokio::io::BufReader;

    async fn run(input: String) -> Vec<Value> {
        let dispatcher = crate::build_dispatcher().unwrap();
        let mut out = Vec::new();
        serve(dispatcher, BufReader::new(input.as_bytes()), &mut out)
            .await
            .unwrap();
        String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    fn lines(messages: &[Value]) -> String {
        messages.iter().map(|m| format!("{m}\n")).collect()
    }

    fn handshake() -> Vec<Value> {
        vec![
            json!({"jsonrpc": "2.0", "id": 1, "method": "initialize",
                   "params": {"protocolVersion": "2024-11-05", "capabilities": {}}}),
            json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
        ]
    }

    #[tokio::test]
    async fn scenario_over_stdio() {
        let mut msgs = handshake();
        msgs.push(json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}));
        msgs.push(json!({"jsonrpc": "2.0", "id": 3, "method": "tools/call",
                         "params": {"name": "nonexistent_tool", "arguments": {}}}));
        msgs.push(json!({"jsonrpc": "2.0", "id": 4, "method": "tools/call",
                         "params": {"name": "solve_graph_coloring",
                                    "arguments": {"edges": [[0, 1], [1, 2]]}}}));
        msgs.push(json!({"jsonrpc": "2.0", "id": 5, "method": "tools/call",
                         "params": {"name": "solve_n_queens", "arguments": {"n": 4}}}));

        let out = run(lines(&msgs)).await;
        assert_eq!(out.len(), 5, "notification must not be answered");

        assert_eq!(out[0]["id"], 1);
        assert!(!out[1]["result"]["tools"].as_array().unwrap().is_empty());
        assert_eq!(out[2]["error"]["code"], METHOD_NOT_FOUND);
        assert_eq!(out[3]["error"]["code"], INVALID_PARAMS);

        let text = out[4]["result"]["content"][0]["text"].as_str().unwrap();
        let payload: Value = serde_json::from_str(text).unwrap();
        assert_eq!(payload["success"], true);
    }

    #[tokio::test]
    async fn blank_lines_are_skipped_and_garbage_answered() {
        let out = run("\n  \nnot json\n".to_string()).await;
        assert_eq!(out.len(), 1);
        assert_eq!(out[0]["id"], Value::Null);
        assert_eq!(out[0]["error"]["code"], PARSE_ERROR);
    }

    #[tokio::test]
    async fn oversized_message_is_rejected_and_stream_continues() {
        let mut input = "x".repeat(MAX_MESSAGE_BYTES + 10);
        input.push('\n');
        input.push_str(&lines(&handshake()));

        let out = run(input).await;
        assert_eq!(out.len(), 2);
        assert_eq!(out[0]["error"]["code"], PARSE_ERROR);
        assert_eq!(out[1]["id"], 1);
    }
}
