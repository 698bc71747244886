use periscope_common::payloads::{ExecuteJsPayload, LocalStoragePayload};
use periscope_common::StorageAction;
use periscope_dom::Document;
use serde_json::{json, Value};

use super::{parse, HandlerError, HandlerResult};

pub(super) fn get_dom(doc: &Document) -> HandlerResult {
    let html = doc.outer_html(doc.document_element());
    if html.is_empty() {
        return Err(HandlerError::Failed("DOM is empty".into()));
    }
    Ok(Value::String(html))
}

pub(super) fn local_storage(doc: &mut Document, payload: Value) -> HandlerResult {
    let req: LocalStoragePayload = parse(payload)?;
    let key = || {
        req.key
            .clone()
            .ok_or_else(|| HandlerError::Failed(format!("{:?} requires a key", req.action)))
    };
    let storage = doc.local_storage_mut();
    match req.action {
        StorageAction::Get => {
            let key = key()?;
            Ok(storage.get(&key).map(|v| json!(v)).unwrap_or(Value::Null))
        }
        StorageAction::Set => {
            let key = key()?;
            let value = req
                .value
                .clone()
                .ok_or_else(|| HandlerError::Failed("set requires a value".into()))?;
            storage.set(key.clone(), value.clone());
            Ok(json!({"key": key, "value": value}))
        }
        StorageAction::Remove => {
            let key = key()?;
            let removed = storage.remove(&key);
            Ok(json!({"key": key, "removed": removed}))
        }
        StorageAction::Clear => {
            let cleared = storage.len();
            storage.clear();
            Ok(json!({"cleared": cleared}))
        }
        StorageAction::Keys => Ok(json!(storage.keys())),
    }
}

pub(super) fn execute_js(doc: &mut Document, payload: Value) -> HandlerResult {
    let req: ExecuteJsPayload = parse(payload)?;
    doc.evaluate(&req.script).map_err(HandlerError::Failed)
}
