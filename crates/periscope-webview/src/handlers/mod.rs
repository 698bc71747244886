//! In-webview event handlers.
//!
//! [`handle_event`] runs one forwarded event to completion and always
//! produces exactly one [`HandlerReply`]. Every failure inside a handler
//! is converted into an error reply here; nothing escapes.

mod dom;
mod iframe;
mod position;
mod screenshot;
mod send_text;

use periscope_common::{names, ErrorCode, HandlerReply};
use periscope_config::ScreenshotConfig;
use periscope_dom::Document;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum HandlerError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Timeout(String),

    #[error("{0}")]
    Failed(String),
}

impl HandlerError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound(_) => ErrorCode::ElementNotFound,
            Self::Timeout(_) => ErrorCode::Timeout,
            Self::Failed(_) => ErrorCode::ExecutionError,
        }
    }
}

pub type HandlerResult = Result<Value, HandlerError>;

/// Per-window state handlers may consult besides the document.
#[derive(Debug, Clone, Default)]
pub struct HandlerSettings {
    pub screenshot: ScreenshotConfig,
}

/// Whether this module handles events named `name`.
pub fn handles(name: &str) -> bool {
    names::ALL.contains(&name)
}

/// Run the handler for `name` and build its terminal reply.
pub async fn handle_event(
    doc: &mut Document,
    label: &str,
    settings: &HandlerSettings,
    name: &str,
    payload: Value,
) -> HandlerReply {
    let correlation_id = payload
        .get(names::CORRELATION_ID)
        .and_then(Value::as_str)
        .map(str::to_owned);

    let result = match name {
        names::GET_DOM => dom::get_dom(doc),
        names::LOCAL_STORAGE => dom::local_storage(doc, payload),
        names::EXECUTE_JS => dom::execute_js(doc, payload),
        names::GET_ELEMENT_POSITION => position::get_element_position(doc, payload),
        names::SEND_TEXT_TO_ELEMENT => send_text::send_text_to_element(doc, payload).await,
        names::CAPTURE_SCREENSHOT => {
            screenshot::capture_screenshot(doc, &settings.screenshot, payload).await
        }
        names::IFRAME_RPC => iframe::iframe_rpc(doc, payload).await,
        other => Err(HandlerError::Failed(format!("no handler for event '{other}'"))),
    };

    let reply = match result {
        Ok(data) => HandlerReply::ok(data),
        Err(e) => {
            debug!(label, event = name, error = %e, "handler failed");
            HandlerReply::err(Some(e.code()), e.to_string())
        }
    };
    reply.correlated(correlation_id, label)
}

fn parse<T: DeserializeOwned>(payload: Value) -> Result<T, HandlerError> {
    serde_json::from_value(payload).map_err(|e| HandlerError::Failed(format!("invalid payload: {e}")))
}
