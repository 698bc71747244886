//! One client connection: NDJSON frames in, NDJSON frames out.
//!
//! Every request line is dispatched on its own task, so a slow command
//! never holds up the ones behind it. Responses are written in completion
//! order through a single writer and carry the request id.

use futures_util::{SinkExt, StreamExt};
use periscope_bridge::Dispatcher;
use periscope_common::{BridgeError, EventBus, Request, Response};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec, LinesCodecError};
use tracing::{debug, info, warn};

use crate::session::Session;

/// Shared by every connection of one server.
#[derive(Clone)]
pub struct ServerContext {
    pub dispatcher: Dispatcher,
    pub bus: EventBus,
    pub max_frame_bytes: usize,
}

/// Serve one connection until the client disconnects.
pub async fn handle_connection<S>(stream: S, peer: String, ctx: ServerContext)
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (reader, writer) = tokio::io::split(stream);
    let mut frames = FramedRead::new(reader, LinesCodec::new_with_max_length(ctx.max_frame_bytes));
    let mut sink = FramedWrite::new(writer, LinesCodec::new());

    let session = Session::open(ctx.bus.clone());
    info!(peer = %peer, session = %session.id(), "client connected");

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let writer_task = tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            if let Err(e) = sink.send(line).await {
                debug!(error = %e, "write failed, dropping remaining responses");
                break;
            }
        }
    });

    while let Some(frame) = frames.next().await {
        match frame {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match parse_request(line) {
                    Ok(request) => {
                        let dispatcher = ctx.dispatcher.clone();
                        let bridge = session.bridge();
                        let tx = tx.clone();
                        tokio::spawn(async move {
                            let response = dispatcher.dispatch(&bridge, request).await;
                            let _ = tx.send(response.to_line());
                        });
                    }
                    Err(response) => {
                        let _ = tx.send(response.to_line());
                    }
                }
            }
            Err(LinesCodecError::MaxLineLengthExceeded) => {
                warn!(peer = %peer, limit = ctx.max_frame_bytes, "oversized frame discarded");
                let err = BridgeError::Transport(format!(
                    "frame exceeds {} bytes",
                    ctx.max_frame_bytes
                ));
                let _ = tx.send(Response::failure(Value::Null, &err).to_line());
            }
            Err(LinesCodecError::Io(e)) => {
                debug!(peer = %peer, error = %e, "read failed");
                break;
            }
        }
    }

    session.close();
    drop(tx);
    // Cancelled requests still answer; the writer drains until every
    // request task has dropped its sender.
    let _ = writer_task.await;
    info!(peer = %peer, session = %session.id(), "client disconnected");
}

/// Parse one frame. Failures become the response to send back, echoing the
/// request id when one can be recovered.
fn parse_request(line: &str) -> Result<Request, Response> {
    let value: Value = serde_json::from_str(line).map_err(|e| {
        Response::failure(
            Value::Null,
            &BridgeError::Transport(format!("malformed request: {e}")),
        )
    })?;
    let id = value.get("id").cloned().unwrap_or(Value::Null);
    serde_json::from_value(value).map_err(|e| {
        Response::failure(id, &BridgeError::Transport(format!("malformed request: {e}")))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unparseable_frame_has_null_id() {
        let resp = parse_request("{not json").unwrap_err();
        assert_eq!(resp.id, Value::Null);
        assert_eq!(resp.code, Some(periscope_common::ErrorCode::TransportError));
    }

    #[test]
    fn request_without_command_keeps_its_id() {
        let resp = parse_request(r#"{"id": 9, "params": {}}"#).unwrap_err();
        assert_eq!(resp.id, json!(9));
        assert!(resp.error.unwrap().contains("command"));
    }

    #[test]
    fn well_formed_request_parses() {
        let req = parse_request(r#"{"id":"a","command":"ping","params":{"value":1}}"#).unwrap();
        assert_eq!(req.command, "ping");
        assert_eq!(req.params["value"], 1);
    }
}
