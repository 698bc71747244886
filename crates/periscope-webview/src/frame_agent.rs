//! The cooperating side of an embedded frame.
//!
//! A frame agent owns the frame's document and answers the two cross-frame
//! requests: self-capture for compositing and calls to exposed methods.
//! Messages of any other type are ignored, the same as a frame that never
//! installed an agent.
//!
//! This is the helper an embedder installs inside a frame it controls so
//! that `iframe_rpc` and screenshot compositing can reach it. Build the
//! agent around the frame's page, expose methods, then attach the returned
//! window to the `<iframe>` element of the parent page:
//!
//! ```no_run
//! use periscope_dom::{Document, NodeId};
//! use periscope_webview::FrameAgent;
//! use serde_json::json;
//!
//! fn embed(parent: &mut Document, iframe: NodeId) {
//!     let (window, _task) = FrameAgent::new(Document::new(300.0, 200.0))
//!         .expose("version", |_, _| Ok(json!("1.4.2")))
//!         .expose("echo", |_, args| Ok(json!(args)))
//!         .spawn();
//!     parent.attach_frame(iframe, window);
//! }
//! ```
//!
//! `spawn` must run inside a tokio runtime. The agent stops when the
//! window is dropped.

use std::collections::HashMap;

use periscope_dom::frame::message_id;
use periscope_dom::{Document, FramePost, FrameWindow};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::capture::{capture_viewport, CaptureOptions};
use crate::protocol::{CALL, CALL_RESULT, CAPTURE_PREVIEW, CAPTURE_PREVIEW_RESULT};

/// A method a frame exposes to its parent.
pub type FrameMethod = Box<dyn FnMut(&mut Document, &[Value]) -> Result<Value, String> + Send>;

pub struct FrameAgent {
    doc: Document,
    methods: HashMap<String, FrameMethod>,
    capture: CaptureOptions,
}

impl FrameAgent {
    pub fn new(doc: Document) -> Self {
        Self {
            doc,
            methods: HashMap::new(),
            capture: CaptureOptions::default(),
        }
    }

    /// Expose `name` to callers in the parent window.
    pub fn expose<F>(mut self, name: &str, method: F) -> Self
    where
        F: FnMut(&mut Document, &[Value]) -> Result<Value, String> + Send + 'static,
    {
        self.methods.insert(name.to_string(), Box::new(method));
        self
    }

    pub fn with_capture_options(mut self, capture: CaptureOptions) -> Self {
        self.capture = capture;
        self
    }

    /// Create the frame's content window and start serving it.
    pub fn spawn(self) -> (FrameWindow, JoinHandle<()>) {
        let origin = self.doc.origin().to_string();
        let (window, inbox) = FrameWindow::channel(origin);
        let task = tokio::spawn(self.run(inbox));
        (window, task)
    }

    async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<FramePost>) {
        while let Some(post) = inbox.recv().await {
            if let Some(reply) = self.handle(&post.data).await {
                post.source.post(reply);
            }
        }
        debug!(origin = %self.doc.origin(), "frame agent stopped");
    }

    async fn handle(&mut self, data: &Value) -> Option<Value> {
        let id = message_id(data)?.to_string();
        match data.get("type").and_then(Value::as_str)? {
            CAPTURE_PREVIEW => {
                let quality = data
                    .get("quality")
                    .and_then(Value::as_u64)
                    .map(|q| q.min(100) as u8)
                    .unwrap_or(self.capture.quality);
                let max_width = data
                    .get("maxWidth")
                    .and_then(Value::as_u64)
                    .map(|w| w as u32)
                    .unwrap_or(self.capture.max_width);
                let opts = self.capture.clone().with_output(quality, max_width);
                let reply = match capture_viewport(&mut self.doc, &opts).await {
                    Ok(capture) => json!({
                        "type": CAPTURE_PREVIEW_RESULT,
                        "id": id,
                        "success": true,
                        "data": capture.data_url,
                    }),
                    Err(e) => json!({
                        "type": CAPTURE_PREVIEW_RESULT,
                        "id": id,
                        "success": false,
                        "error": e,
                    }),
                };
                Some(reply)
            }
            CALL => {
                let method = data.get("method").and_then(Value::as_str).unwrap_or("");
                let args = data
                    .get("args")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                let outcome = match self.methods.get_mut(method) {
                    Some(f) => f(&mut self.doc, &args),
                    None => Err(format!("method not found: {method}")),
                };
                Some(match outcome {
                    Ok(result) => json!({"type": CALL_RESULT, "id": id, "result": result, "error": null}),
                    Err(error) => json!({"type": CALL_RESULT, "id": id, "result": null, "error": error}),
                })
            }
            other => {
                debug!(kind = other, "frame ignored message");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::call_frame;
    use periscope_dom::MessageHub;
    use std::time::Duration;

    #[tokio::test]
    async fn serves_exposed_methods() {
        let mut doc = Document::new(100.0, 100.0).with_location("https://child.test/");
        doc.set_title("Child");
        let agent = FrameAgent::new(doc)
            .expose("title", |doc, _| Ok(json!(doc.title())))
            .expose("fail", |_, _| Err("nope".into()));
        let (window, _task) = agent.spawn();
        assert_eq!(window.origin(), "https://child.test");

        let hub = MessageHub::new();
        let reply = call_frame(&window, &hub, "title", &[], Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(reply["result"], "Child");
        assert_eq!(reply["error"], Value::Null);

        let reply = call_frame(&window, &hub, "fail", &[], Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(reply["error"], "nope");

        let reply = call_frame(&window, &hub, "missing", &[], Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(reply["error"], "method not found: missing");
    }

    #[tokio::test]
    async fn answers_capture_requests() {
        let (window, _task) = FrameAgent::new(Document::new(50.0, 50.0)).spawn();
        let hub = MessageHub::new();
        let mut listener = hub.listen("cap-1");
        window.post_message(
            json!({"type": CAPTURE_PREVIEW, "id": "cap-1", "quality": 50, "maxWidth": 25}),
            &hub,
        );
        let reply = listener.recv().await.unwrap();
        assert_eq!(reply["type"], CAPTURE_PREVIEW_RESULT);
        assert_eq!(reply["success"], true);
        assert!(reply["data"].as_str().unwrap().starts_with("data:image/jpeg"));
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_messages_get_no_reply() {
        let (window, _task) = FrameAgent::new(Document::new(10.0, 10.0)).spawn();
        let hub = MessageHub::new();
        let mut listener = hub.listen("x");
        window.post_message(json!({"type": "hello", "id": "x"}), &hub);
        let res = tokio::time::timeout(Duration::from_secs(1), listener.recv()).await;
        assert!(res.is_err());
    }
}
