use periscope_common::payloads::ElementPositionPayload;
use periscope_dom::{DomEvent, Document};
use serde_json::{json, Value};

use super::{parse, HandlerError, HandlerResult};
use crate::lookup::locate;
use crate::typing::{element_summary, EditorKind};

const CLICK_SEQUENCE: [&str; 3] = ["mousedown", "mouseup", "click"];

pub(super) fn get_element_position(doc: &mut Document, payload: Value) -> HandlerResult {
    let req: ElementPositionPayload = parse(payload)?;
    let found =
        locate(doc, req.selector_type, &req.selector_value).map_err(HandlerError::NotFound)?;
    let node = found.node;

    let rect = doc.rect(node);
    let (cx, cy) = rect.center();
    let (x, y) = if req.raw_coordinates {
        (cx, cy)
    } else {
        // Screen pixels: window origin plus viewport offset, in device pixels.
        let vp = doc.viewport();
        (
            (vp.screen_x + cx) * vp.device_pixel_ratio,
            (vp.screen_y + cy) * vp.device_pixel_ratio,
        )
    };

    let mut clicked = false;
    if req.should_click {
        for kind in CLICK_SEQUENCE {
            doc.dispatch_event(node, DomEvent::new(kind))
                .map_err(|e| HandlerError::Failed(format!("{kind} listener threw: {e}")))?;
        }
        clicked = true;
    }

    Ok(json!({
        "x": x.round(),
        "y": y.round(),
        "width": rect.width,
        "height": rect.height,
        "rawCoordinates": req.raw_coordinates,
        "element": element_summary(doc, node, EditorKind::detect(doc, node)),
        "matchCount": found.match_count,
        "clicked": clicked,
        "diagnostic": found.diagnostic,
    }))
}
