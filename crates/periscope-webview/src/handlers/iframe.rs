use std::time::Duration;

use periscope_common::payloads::IframeRpcPayload;
use periscope_dom::Document;
use serde_json::{json, Value};

use super::{parse, HandlerError, HandlerResult};
use crate::rpc::{call_frame, find_frame, RpcError};

pub(super) async fn iframe_rpc(doc: &mut Document, payload: Value) -> HandlerResult {
    let req: IframeRpcPayload = parse(payload)?;
    let window = find_frame(doc, req.frame_id.as_deref()).map_err(|e| match e {
        RpcError::NoFrame(_) => HandlerError::NotFound(e.to_string()),
        other => HandlerError::Failed(other.to_string()),
    })?;
    let hub = doc.message_hub().clone();

    let reply = call_frame(
        &window,
        &hub,
        &req.method,
        &req.args,
        Duration::from_millis(req.timeout_ms),
    )
    .await
    .map_err(|e| match e {
        RpcError::Timeout { .. } => HandlerError::Timeout(e.to_string()),
        other => HandlerError::Failed(other.to_string()),
    })?;

    Ok(json!({
        "result": reply.get("result").cloned().unwrap_or(Value::Null),
        "error": reply.get("error").cloned().unwrap_or(Value::Null),
    }))
}
