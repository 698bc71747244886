use std::time::Duration;

use periscope_common::payloads::SendTextPayload;
use periscope_dom::Document;
use serde_json::{json, Value};
use tracing::debug;

use super::{parse, HandlerError, HandlerResult};
use crate::lookup::locate;
use crate::typing::{element_summary, inject_text};

pub(super) async fn send_text_to_element(doc: &mut Document, payload: Value) -> HandlerResult {
    let req: SendTextPayload = parse(payload)?;
    let found =
        locate(doc, req.selector_type, &req.selector_value).map_err(HandlerError::NotFound)?;

    let injection = inject_text(doc, found.node, &req.text, Duration::from_millis(req.delay_ms))
        .await
        .map_err(HandlerError::Failed)?;
    debug!(
        chars = req.text.chars().count(),
        editor = ?injection.editor,
        used_fallback = injection.used_fallback,
        "text injected"
    );

    let mut data = element_summary(doc, found.node, injection.editor);
    if let Value::Object(map) = &mut data {
        map.insert("usedFallback".into(), json!(injection.used_fallback));
        map.insert("typedChars".into(), json!(req.text.chars().count()));
        map.insert("diagnostic".into(), json!(found.diagnostic));
    }
    Ok(data)
}
