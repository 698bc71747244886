//! Correlated method calls into an embedded frame.
//!
//! Each call gets a fresh correlation id, so concurrent calls to the same
//! or different methods never see each other's replies. The reply listener
//! is removed on success, failure and timeout alike; there is no retry.

use std::time::Duration;

use periscope_common::new_correlation_id;
use periscope_dom::{Document, FrameWindow, MessageHub};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

use crate::protocol::CALL;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RpcError {
    #[error("no iframe found{0}")]
    NoFrame(String),

    #[error("iframe has no content window")]
    NotLoaded,

    #[error("iframe is no longer reachable")]
    Unreachable,

    #[error("iframe did not answer `{method}` within {timeout_ms}ms")]
    Timeout { method: String, timeout_ms: u64 },
}

/// Resolve the target frame: the iframe with element id `frame_id`, or the
/// first iframe in the document.
pub fn find_frame(doc: &Document, frame_id: Option<&str>) -> Result<FrameWindow, RpcError> {
    let node = match frame_id {
        Some(id) => doc
            .get_element_by_id(id)
            .filter(|n| doc.tag_name(*n) == Some("iframe"))
            .ok_or_else(|| RpcError::NoFrame(format!(" with id '{id}'")))?,
        None => doc
            .get_elements_by_tag_name("iframe")
            .into_iter()
            .next()
            .ok_or_else(|| RpcError::NoFrame(String::new()))?,
    };
    doc.frame_window(node).cloned().ok_or(RpcError::NotLoaded)
}

/// Call `method` in the frame and wait for the first reply with our id.
///
/// Returns the raw reply message.
pub async fn call_frame(
    window: &FrameWindow,
    hub: &MessageHub,
    method: &str,
    args: &[Value],
    timeout: Duration,
) -> Result<Value, RpcError> {
    let id = new_correlation_id();
    let mut listener = hub.listen(id.clone());
    let request = json!({
        "type": CALL,
        "id": id,
        "correlationId": id,
        "method": method,
        "args": args,
    });
    debug!(correlation_id = %id, method, "calling into iframe");
    if !window.post_message(request, hub) {
        return Err(RpcError::Unreachable);
    }
    match tokio::time::timeout(timeout, listener.recv()).await {
        Ok(Some(reply)) => Ok(reply),
        Ok(None) => Err(RpcError::Unreachable),
        Err(_) => Err(RpcError::Timeout {
            method: method.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::CALL_RESULT;

    fn echo_frame() -> FrameWindow {
        let (window, mut inbox) = FrameWindow::channel("https://child.test");
        tokio::spawn(async move {
            while let Some(post) = inbox.recv().await {
                let data = post.data;
                post.source.post(json!({
                    "type": CALL_RESULT,
                    "id": data["id"],
                    "result": {"method": data["method"], "args": data["args"]},
                }));
            }
        });
        window
    }

    #[tokio::test]
    async fn reply_is_matched_by_correlation_id() {
        let hub = MessageHub::new();
        let window = echo_frame();
        let reply = call_frame(&window, &hub, "sum", &[json!(1), json!(2)], Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(reply["result"]["method"], "sum");
        assert_eq!(reply["result"]["args"], json!([1, 2]));
        assert_eq!(hub.listener_count(), 0);
    }

    #[tokio::test]
    async fn concurrent_calls_do_not_cross() {
        let hub = MessageHub::new();
        let window = echo_frame();
        let (a, b) = tokio::join!(
            call_frame(&window, &hub, "a", &[], Duration::from_secs(1)),
            call_frame(&window, &hub, "b", &[], Duration::from_secs(1)),
        );
        assert_eq!(a.unwrap()["result"]["method"], "a");
        assert_eq!(b.unwrap()["result"]["method"], "b");
    }

    #[tokio::test(start_paused = true)]
    async fn silent_frame_times_out_and_cleans_up() {
        let hub = MessageHub::new();
        let (window, _inbox) = FrameWindow::channel("https://child.test");
        let err = call_frame(&window, &hub, "slow", &[], Duration::from_millis(250))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            RpcError::Timeout {
                method: "slow".into(),
                timeout_ms: 250
            }
        );
        assert_eq!(hub.listener_count(), 0);
    }

    #[test]
    fn find_frame_by_id_or_first() {
        let mut doc = Document::new(100.0, 100.0);
        let body = doc.body();
        let first = doc.append_element(body, "iframe", &[("id", "one")]);
        let second = doc.append_element(body, "iframe", &[("id", "two")]);
        let (w1, _i1) = FrameWindow::channel("https://one.test");
        let (w2, _i2) = FrameWindow::channel("https://two.test");
        doc.attach_frame(first, w1);
        doc.attach_frame(second, w2);

        assert_eq!(find_frame(&doc, None).unwrap().origin(), "https://one.test");
        assert_eq!(find_frame(&doc, Some("two")).unwrap().origin(), "https://two.test");
        assert!(matches!(find_frame(&doc, Some("nope")), Err(RpcError::NoFrame(_))));
    }

    #[test]
    fn unloaded_frame_is_reported() {
        let mut doc = Document::new(100.0, 100.0);
        let body = doc.body();
        doc.append_element(body, "iframe", &[]);
        assert_eq!(find_frame(&doc, None).unwrap_err(), RpcError::NotLoaded);
        assert_eq!(
            find_frame(&Document::new(1.0, 1.0), None).unwrap_err().to_string(),
            "no iframe found"
        );
    }
}
