//! Nested-frame compositing.
//!
//! Every visible iframe is asked to capture itself over `postMessage`. All
//! frames are asked at once and each reply races the same fixed deadline,
//! so one silent frame costs at most that deadline. Frames that fail or
//! never answer are left blank.

use std::time::Duration;

use futures_util::future::join_all;
use periscope_common::new_correlation_id;
use periscope_dom::{Canvas, Document, FrameWindow, MessageHub, Rect};
use serde_json::{json, Value};
use tracing::debug;

use crate::protocol::{CAPTURE_PREVIEW, CAPTURE_PREVIEW_RESULT};

/// An iframe to composite, detached from the document.
#[derive(Clone)]
pub struct FrameTarget {
    pub rect: Rect,
    pub window: Option<FrameWindow>,
    /// Element id or position, for logs.
    pub name: String,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FrameReport {
    pub composited: usize,
    pub omitted: usize,
}

/// Iframes with a non-empty rendered box, in document order.
pub fn frame_targets(doc: &Document) -> Vec<FrameTarget> {
    doc.get_elements_by_tag_name("iframe")
        .into_iter()
        .enumerate()
        .filter_map(|(index, node)| {
            let el = doc.element(node)?;
            (!el.rect.is_empty()).then(|| FrameTarget {
                rect: el.rect,
                window: el.frame.clone(),
                name: el
                    .id()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("iframe[{index}]")),
            })
        })
        .collect()
}

/// Ask every target for a self-capture and draw the ones that arrive.
pub async fn composite(
    targets: &[FrameTarget],
    hub: &MessageHub,
    canvas: &mut Canvas,
    quality: u8,
    deadline: Duration,
) -> FrameReport {
    let scale = canvas.scale();
    let requests = targets
        .iter()
        .map(|target| request_capture(target, hub, quality, scale, deadline));
    let replies = join_all(requests).await;

    let mut report = FrameReport::default();
    for (target, reply) in targets.iter().zip(replies) {
        let drawn = match reply {
            Some(data_url) => match canvas.draw_data_url(&data_url, target.rect) {
                Ok(()) => true,
                Err(e) => {
                    debug!(frame = %target.name, error = %e, "frame capture could not be drawn");
                    false
                }
            },
            None => false,
        };
        if drawn {
            report.composited += 1;
        } else {
            report.omitted += 1;
        }
    }
    report
}

async fn request_capture(
    target: &FrameTarget,
    hub: &MessageHub,
    quality: u8,
    scale: f64,
    deadline: Duration,
) -> Option<String> {
    let Some(window) = target.window.as_ref() else {
        debug!(frame = %target.name, "frame has no content window");
        return None;
    };
    let id = new_correlation_id();
    let mut listener = hub.listen(id.clone());
    let max_width = ((target.rect.width * scale).ceil() as u32).max(1);
    let request = json!({
        "type": CAPTURE_PREVIEW,
        "id": id,
        "correlationId": id,
        "quality": quality,
        "maxWidth": max_width,
    });
    if !window.post_message(request, hub) {
        debug!(frame = %target.name, "frame is gone");
        return None;
    }

    match tokio::time::timeout(deadline, listener.recv()).await {
        Ok(Some(reply)) => capture_data(&reply).or_else(|| {
            debug!(frame = %target.name, "frame declined to capture");
            None
        }),
        Ok(None) => None,
        Err(_) => {
            debug!(frame = %target.name, deadline_ms = deadline.as_millis() as u64, "frame capture timed out");
            None
        }
    }
}

fn capture_data(reply: &Value) -> Option<String> {
    if reply.get("type").and_then(Value::as_str) != Some(CAPTURE_PREVIEW_RESULT) {
        return None;
    }
    if reply.get("success").and_then(Value::as_bool) != Some(true) {
        return None;
    }
    reply
        .get("data")
        .and_then(Value::as_str)
        .filter(|d| d.starts_with("data:image/"))
        .map(str::to_string)
}
