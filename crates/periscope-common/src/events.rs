//! The host <-> webview event bus.
//!
//! Host and webview never call each other directly: both sides emit named
//! events and listen for the ones they care about.
//!
//! Events addressed to a window land in that window's inbox, an unbounded
//! FIFO the window drains one event at a time. A slow handler delays what
//! is queued behind it; nothing is dropped. Responses are published to
//! every subscriber, each of which gets its own unbounded queue.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::debug;

use crate::errors::ErrorCode;

/// A single named event on the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusEvent {
    pub name: String,
    /// Window label the event is addressed to; `None` reaches every listener.
    pub target: Option<String>,
    pub payload: Value,
}

impl BusEvent {
    pub fn to(target: impl Into<String>, name: impl Into<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            target: Some(target.into()),
            payload,
        }
    }

    pub fn broadcast(name: impl Into<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            target: None,
            payload,
        }
    }

    /// Whether a listener registered under `label` receives this event.
    pub fn is_for(&self, label: &str) -> bool {
        self.target.as_deref().map_or(true, |t| t == label)
    }
}

/// The terminal response a webview handler emits for one bridged event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandlerReply {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    /// Label of the window whose handler produced the reply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_label: Option<String>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
}

impl HandlerReply {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            ..Default::default()
        }
    }

    pub fn err(code: Option<ErrorCode>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            code,
            ..Default::default()
        }
    }

    pub fn correlated(mut self, correlation_id: Option<String>, label: &str) -> Self {
        self.correlation_id = correlation_id;
        self.window_label = Some(label.to_string());
        self
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Names of the events the host forwards to webview handlers.
pub mod names {
    pub const GET_DOM: &str = "get-dom";
    pub const LOCAL_STORAGE: &str = "local-storage";
    pub const EXECUTE_JS: &str = "execute-js";
    pub const GET_ELEMENT_POSITION: &str = "get-element-position";
    pub const SEND_TEXT_TO_ELEMENT: &str = "send-text-to-element";
    pub const CAPTURE_SCREENSHOT: &str = "capture-screenshot";
    pub const IFRAME_RPC: &str = "iframe-rpc";

    pub const ALL: &[&str] = &[
        GET_DOM,
        LOCAL_STORAGE,
        EXECUTE_JS,
        GET_ELEMENT_POSITION,
        SEND_TEXT_TO_ELEMENT,
        CAPTURE_SCREENSHOT,
        IFRAME_RPC,
    ];

    /// Key carrying the bridge-generated correlation id in event payloads.
    pub const CORRELATION_ID: &str = "correlationId";
}

/// Name of the event a handler emits in response to `event`.
pub fn response_event_name(event: &str) -> String {
    format!("{event}-response")
}

/// Events addressed to one window, in emit order.
pub type WindowInbox = mpsc::UnboundedReceiver<BusEvent>;

/// Every event published after the subscription was taken.
pub type Subscription = mpsc::UnboundedReceiver<BusEvent>;

#[derive(Default)]
struct Channels {
    inboxes: RwLock<HashMap<String, mpsc::UnboundedSender<BusEvent>>>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<BusEvent>>>,
}

/// Event bus shared by the host and every webview window.
#[derive(Clone, Default)]
pub struct EventBus {
    channels: Arc<Channels>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the inbox for window `label`. A previous inbox under the same
    /// label is closed.
    pub fn attach(&self, label: &str) -> WindowInbox {
        let (tx, rx) = mpsc::unbounded_channel();
        let replaced = self
            .channels
            .inboxes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(label.to_string(), tx)
            .is_some();
        if replaced {
            debug!(label, "window inbox replaced");
        }
        rx
    }

    /// Close the inbox for `label`. Returns false if there was none.
    pub fn detach(&self, label: &str) -> bool {
        self.channels
            .inboxes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(label)
            .is_some()
    }

    /// Whether a window is reading events under `label`.
    pub fn is_attached(&self, label: &str) -> bool {
        self.channels
            .inboxes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(label)
            .is_some_and(|tx| !tx.is_closed())
    }

    /// Queue `event` for its target window, or for every window when it
    /// has no target. Returns the number of inboxes it reached.
    pub fn deliver(&self, event: BusEvent) -> usize {
        let inboxes = self
            .channels
            .inboxes
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        match event.target.as_deref() {
            Some(label) => inboxes
                .get(label)
                .map_or(0, |tx| usize::from(tx.send(event.clone()).is_ok())),
            None => inboxes
                .values()
                .filter(|tx| tx.send(event.clone()).is_ok())
                .count(),
        }
    }

    pub fn emit_to(&self, target: &str, name: &str, payload: Value) -> usize {
        self.deliver(BusEvent::to(target, name, payload))
    }

    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        self.channels
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    /// Publish an event to every subscriber. Returns how many it reached;
    /// subscribers that went away are pruned.
    pub fn publish(&self, event: BusEvent) -> usize {
        let mut subscribers = self
            .channels
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        subscribers.len()
    }

    pub fn emit(&self, name: &str, payload: Value) -> usize {
        self.publish(BusEvent::broadcast(name, payload))
    }
}
