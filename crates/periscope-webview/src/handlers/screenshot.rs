use periscope_common::payloads::CapturePayload;
use periscope_config::ScreenshotConfig;
use periscope_dom::Document;
use serde_json::Value;

use super::{parse, HandlerError, HandlerResult};
use crate::capture::{capture_viewport, CaptureOptions};

pub(super) async fn capture_screenshot(
    doc: &mut Document,
    config: &ScreenshotConfig,
    payload: Value,
) -> HandlerResult {
    let req: CapturePayload = parse(payload)?;
    let opts = CaptureOptions::from_config(config).with_output(req.quality, req.max_width);
    let capture = capture_viewport(doc, &opts)
        .await
        .map_err(HandlerError::Failed)?;
    Ok(capture.to_value())
}
