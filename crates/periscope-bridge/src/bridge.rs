//! Request/response over the webview event bus.
//!
//! A [`Bridge`] turns "emit an event, wait for its `-response`" into one
//! awaitable call with a deadline. Each bridge has its own pending table
//! and its own bus subscription; responses it does not recognise are
//! dropped, so several bridges can share one bus. Subscriptions are
//! unbounded, so a burst of responses is never skipped.

use std::sync::Arc;
use std::time::Duration;

use periscope_common::{
    names, new_correlation_id, BridgeError, EventBus, HandlerReply, Subscription,
};
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::pending::{PendingTable, Settlement};

const RESPONSE_SUFFIX: &str = "-response";

pub struct Bridge {
    bus: EventBus,
    pending: Arc<PendingTable>,
    listener: JoinHandle<()>,
}

impl Bridge {
    /// Subscribe to `bus` and start matching responses.
    pub fn new(bus: EventBus) -> Self {
        let pending = Arc::new(PendingTable::new());
        let rx = bus.subscribe();
        let listener = tokio::spawn(listen(rx, pending.clone()));
        Self {
            bus,
            pending,
            listener,
        }
    }

    /// Emit `event` at window `label` and wait up to `timeout` for its
    /// response.
    ///
    /// A correlation id is added to the payload; objects get it as a key,
    /// anything else is wrapped as `{value, correlationId}`.
    pub async fn request(
        &self,
        label: &str,
        event: &str,
        payload: Value,
        timeout: Duration,
    ) -> Result<HandlerReply, BridgeError> {
        let correlation_id = new_correlation_id();
        let payload = with_correlation_id(payload, &correlation_id);

        // Register before emitting so a fast handler cannot answer first.
        let mut rx = self.pending.register(&correlation_id, label, event);
        let reached = self.bus.emit_to(label, event, payload);
        if reached == 0 {
            self.pending.expire(&correlation_id);
            debug!(label, event, %correlation_id, "no window to receive event");
            return Err(BridgeError::WindowNotFound(label.to_string()));
        }
        debug!(label, event, %correlation_id, "event emitted");

        let settled = match tokio::time::timeout(timeout, &mut rx).await {
            Ok(Ok(settlement)) => settlement,
            Ok(Err(_)) => Settlement::Cancelled,
            Err(_) => {
                if self.pending.expire(&correlation_id) {
                    debug!(label, event, %correlation_id, "request timed out");
                    return Err(BridgeError::Timeout {
                        event: event.to_string(),
                        timeout_ms: timeout.as_millis() as u64,
                    });
                }
                // A response won the race against the deadline. Its waiter
                // is already out of the table, so the send is imminent.
                (&mut rx).await.unwrap_or(Settlement::Cancelled)
            }
        };

        match settled {
            Settlement::Reply(reply) => Ok(reply),
            Settlement::Cancelled => Err(BridgeError::Cancelled(format!(
                "{event} on window {label}"
            ))),
        }
    }

    /// Requests still waiting on a response.
    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    /// Cancel everything in flight and stop listening. Returns how many
    /// requests were cancelled. Handlers already running in a webview are
    /// not interrupted; their responses are dropped.
    pub fn shutdown(&self) -> usize {
        self.listener.abort();
        self.pending.drain()
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

fn with_correlation_id(payload: Value, correlation_id: &str) -> Value {
    match payload {
        Value::Object(mut map) => {
            map.insert(
                names::CORRELATION_ID.to_string(),
                Value::String(correlation_id.to_string()),
            );
            Value::Object(map)
        }
        other => {
            let mut map = serde_json::Map::new();
            map.insert("value".to_string(), other);
            map.insert(
                names::CORRELATION_ID.to_string(),
                Value::String(correlation_id.to_string()),
            );
            Value::Object(map)
        }
    }
}

/// The forwarded event a response name answers, if it is one of ours.
fn answered_event(name: &str) -> Option<&str> {
    let event = name.strip_suffix(RESPONSE_SUFFIX)?;
    names::ALL.contains(&event).then_some(event)
}

async fn listen(mut rx: Subscription, pending: Arc<PendingTable>) {
    while let Some(event) = rx.recv().await {
        let Some(answered) = answered_event(&event.name) else {
            continue;
        };
        let reply: HandlerReply = match serde_json::from_value(event.payload) {
            Ok(reply) => reply,
            Err(e) => {
                warn!(event = %event.name, error = %e, "malformed handler response");
                continue;
            }
        };
        let correlation_id = reply.correlation_id.clone();
        if !pending.resolve(answered, reply) {
            debug!(
                event = %event.name,
                correlation_id = correlation_id.as_deref(),
                "late or foreign response dropped"
            );
        }
    }
}
