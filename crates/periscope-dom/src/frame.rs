//! Cross-frame messaging (`window.postMessage`).
//!
//! Every window owns a [`MessageHub`]: the set of `message` listeners
//! waiting for a reply keyed by correlation id. A parent reaches an
//! embedded frame through the frame's [`FrameWindow`], posting a message
//! together with its own hub so the frame knows where to answer.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

type Listeners = Arc<Mutex<HashMap<String, oneshot::Sender<Value>>>>;

/// Correlation id of a cross-frame message (`id`, or `correlationId`).
pub fn message_id(data: &Value) -> Option<&str> {
    data.get("id")
        .or_else(|| data.get("correlationId"))
        .and_then(Value::as_str)
}

/// A window's registry of pending `message` listeners.
#[derive(Clone, Default)]
pub struct MessageHub {
    listeners: Listeners,
}

impl MessageHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for the first message carrying `id`.
    ///
    /// The listener is removed when it receives, or when it is dropped.
    pub fn listen(&self, id: impl Into<String>) -> MessageListener {
        let id = id.into();
        let (tx, rx) = oneshot::channel();
        if let Ok(mut map) = self.listeners.lock() {
            map.insert(id.clone(), tx);
        }
        MessageListener {
            id,
            listeners: self.listeners.clone(),
            rx,
        }
    }

    /// Deliver a message to this window. Returns whether a listener took it;
    /// messages nobody waits for are dropped.
    pub fn post(&self, data: Value) -> bool {
        let Some(id) = message_id(&data).map(str::to_owned) else {
            debug!("window message without id dropped");
            return false;
        };
        let sender = self.listeners.lock().ok().and_then(|mut map| map.remove(&id));
        match sender {
            Some(tx) => tx.send(data).is_ok(),
            None => {
                debug!(id = %id, "window message with no listener dropped");
                false
            }
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().map(|m| m.len()).unwrap_or(0)
    }
}

/// A pending `message` listener. Dropping it unregisters it.
pub struct MessageListener {
    id: String,
    listeners: Listeners,
    rx: oneshot::Receiver<Value>,
}

impl MessageListener {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Wait for the matching message. `None` if the hub went away.
    pub async fn recv(&mut self) -> Option<Value> {
        (&mut self.rx).await.ok()
    }
}

impl Drop for MessageListener {
    fn drop(&mut self) {
        if let Ok(mut map) = self.listeners.lock() {
            map.remove(&self.id);
        }
    }
}

/// A message posted into a frame, with the poster's window for replies.
pub struct FramePost {
    pub data: Value,
    pub source: MessageHub,
}

/// An embedded frame's content window, as seen from its parent.
#[derive(Clone)]
pub struct FrameWindow {
    origin: String,
    inbox: mpsc::UnboundedSender<FramePost>,
}

impl fmt::Debug for FrameWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameWindow")
            .field("origin", &self.origin)
            .field("closed", &self.inbox.is_closed())
            .finish()
    }
}

impl FrameWindow {
    /// Create a content window and the inbox the frame reads from.
    pub fn channel(origin: impl Into<String>) -> (Self, mpsc::UnboundedReceiver<FramePost>) {
        let (inbox, rx) = mpsc::unbounded_channel();
        (
            Self {
                origin: origin.into(),
                inbox,
            },
            rx,
        )
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Post a message into the frame. Returns false if the frame is gone.
    pub fn post_message(&self, data: Value, source: &MessageHub) -> bool {
        self.inbox
            .send(FramePost {
                data,
                source: source.clone(),
            })
            .is_ok()
    }
}
