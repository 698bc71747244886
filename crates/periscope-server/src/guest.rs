//! IPC between the host and the guest script running in a native webview.
//!
//! Messages flow in both directions:
//! - **host -> guest**: a forwarded [`BusEvent`] becomes a
//!   `window.__periscope._dispatch({...})` call evaluated in the page.
//! - **guest -> host**: the guest calls
//!   `window.ipc.postMessage(JSON.stringify({kind, payload}))` with
//!   `kind` set to `<event>-response`, which is published on the bus.

use periscope_common::{names, BusEvent, EventBus};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// Guest bundle injected as the initialization script of every window.
const GUEST_BUNDLE: &str = include_str!("../assets/guest.js");
const LABEL_PLACEHOLDER: &str = "\"__PERISCOPE_LABEL__\"";

/// Sent once per page load, after the guest has installed its handlers.
pub const GUEST_READY: &str = "guest-ready";

/// A message posted by the guest script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuestMessage {
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
}

impl GuestMessage {
    pub fn from_json(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }

    /// Whether this is the response to one of the forwarded events.
    pub fn is_response(&self) -> bool {
        self.kind
            .strip_suffix("-response")
            .is_some_and(|event| names::ALL.contains(&event))
    }
}

/// The guest bundle for window `label`.
pub fn init_script(label: &str) -> String {
    let label = serde_json::to_string(label).unwrap_or_else(|_| "\"main\"".to_string());
    GUEST_BUNDLE.replacen(LABEL_PLACEHOLDER, &label, 1)
}

/// Script that hands `event` to the guest's serial handler queue.
pub fn dispatch_script(event: &BusEvent) -> String {
    let event = serde_json::to_string(event).unwrap_or_else(|_| "null".to_string());
    format!("window.__periscope && window.__periscope._dispatch({event});")
}

/// What an IPC message from window `label` turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inbound {
    /// The guest finished installing; queued events may be dispatched.
    Ready,
    /// A handler response, published to this many bus subscribers.
    Response(usize),
    Rejected,
}

/// Route one raw IPC body from the guest in window `label`.
pub fn receive(bus: &EventBus, label: &str, body: &str) -> Inbound {
    let Some(msg) = GuestMessage::from_json(body) else {
        warn!(label, body_len = body.len(), "IPC message rejected: failed to parse");
        return Inbound::Rejected;
    };
    if msg.kind == GUEST_READY {
        debug!(label, "guest ready");
        return Inbound::Ready;
    }
    if !msg.is_response() {
        warn!(label, kind = %msg.kind, "IPC message rejected: unknown kind");
        return Inbound::Rejected;
    }
    Inbound::Response(bus.emit(&msg.kind, msg.payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn responses_are_recognised() {
        let msg = GuestMessage::from_json(
            r#"{"kind":"get-dom-response","payload":{"success":true,"data":"<html></html>"}}"#,
        )
        .unwrap();
        assert!(msg.is_response());
        assert_eq!(msg.payload["success"], true);

        let ready = GuestMessage::from_json(r#"{"kind":"guest-ready","payload":{}}"#).unwrap();
        assert!(!ready.is_response());
        let unknown = GuestMessage::from_json(r#"{"kind":"reload-response"}"#).unwrap();
        assert!(!unknown.is_response());
        assert_eq!(unknown.payload, Value::Null);
    }

    #[test]
    fn malformed_messages_are_rejected() {
        assert!(GuestMessage::from_json("not json").is_none());
        assert!(GuestMessage::from_json(r#"{"payload":1}"#).is_none());
    }

    #[test]
    fn receive_publishes_responses_only() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        let body = r#"{"kind":"execute-js-response","payload":{"correlationId":"c9","success":true,"data":2}}"#;
        assert_eq!(receive(&bus, "main", body), Inbound::Response(1));
        let event = rx.try_recv().unwrap();
        assert_eq!(event.name, "execute-js-response");
        assert_eq!(event.payload["correlationId"], "c9");

        assert_eq!(
            receive(&bus, "main", r#"{"kind":"guest-ready","payload":{}}"#),
            Inbound::Ready
        );
        assert_eq!(
            receive(&bus, "main", r#"{"kind":"open-devtools"}"#),
            Inbound::Rejected
        );
        assert_eq!(receive(&bus, "main", "{"), Inbound::Rejected);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn init_script_carries_the_label() {
        let script = init_script("side \"panel\"");
        assert!(script.contains(r#"var LABEL = "side \"panel\"";"#));
        assert!(!script.contains("__PERISCOPE_LABEL__"));
        for event in names::ALL {
            assert!(script.contains(&format!("\"{event}\"")), "guest lacks {event}");
        }
    }

    #[test]
    fn dispatch_script_embeds_the_event() {
        let event = BusEvent::to("main", names::GET_DOM, json!({"correlationId": "c1"}));
        let script = dispatch_script(&event);
        assert!(script.starts_with("window.__periscope && window.__periscope._dispatch({"));
        assert!(script.contains(r#""name":"get-dom""#));
        assert!(script.contains(r#""correlationId":"c1""#));
        assert!(script.ends_with(");"));
    }
}
