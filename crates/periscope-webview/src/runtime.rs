//! The event loop of one webview window.
//!
//! A window's page is owned by a single task that takes forwarded events off
//! its inbox one at a time and runs each handler to completion before the
//! next. Handlers may suspend (typing delays, frame replies) but never
//! interleave with each other, so DOM mutations within one handler are
//! atomic. A slow handler delays everything queued behind it.

use periscope_common::{names, response_event_name, BusEvent, EventBus, WindowInbox};
use periscope_dom::Document;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::handlers::{handle_event, HandlerSettings};

pub struct Webview {
    label: String,
    doc: Document,
    bus: EventBus,
    settings: HandlerSettings,
}

impl Webview {
    pub fn new(label: impl Into<String>, doc: Document, bus: EventBus) -> Self {
        Self {
            label: label.into(),
            doc,
            bus,
            settings: HandlerSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: HandlerSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Start serving events. The window's inbox is opened before the task
    /// starts, so nothing emitted after `spawn` returns is missed.
    pub fn spawn(self) -> JoinHandle<()> {
        let inbox = self.bus.attach(&self.label);
        tokio::spawn(self.run(inbox))
    }

    async fn run(mut self, mut inbox: WindowInbox) {
        info!(label = %self.label, "webview listening");
        while let Some(event) = inbox.recv().await {
            self.dispatch(event).await;
        }
        info!(label = %self.label, "inbox closed, webview stopping");
    }

    async fn dispatch(&mut self, event: BusEvent) {
        debug!(
            label = %self.label,
            event = %event.name,
            correlation_id = event.payload.get(names::CORRELATION_ID).and_then(|v| v.as_str()),
            "handling event"
        );
        let reply = handle_event(
            &mut self.doc,
            &self.label,
            &self.settings,
            &event.name,
            event.payload,
        )
        .await;
        let reached = self
            .bus
            .emit(&response_event_name(&event.name), reply.to_value());
        if reached == 0 {
            debug!(label = %self.label, event = %event.name, "response had no listeners");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use periscope_common::Subscription;
    use periscope_dom::Rect;
    use serde_json::json;
    use std::collections::HashSet;
    use std::time::Duration;

    async fn next_named(rx: &mut Subscription, name: &str) -> BusEvent {
        loop {
            let event = rx.recv().await.unwrap();
            if event.name == name {
                return event;
            }
        }
    }

    #[tokio::test]
    async fn answers_targeted_events() {
        let bus = EventBus::new();
        let mut doc = Document::new(100.0, 100.0);
        doc.set_title("Hello");
        let _task = Webview::new("main", doc, bus.clone()).spawn();
        let mut rx = bus.subscribe();

        bus.emit_to(
            "main",
            names::EXECUTE_JS,
            json!({"script": "document.title", "correlationId": "k1"}),
        );
        let event = next_named(&mut rx, "execute-js-response").await;
        assert_eq!(event.payload["success"], true);
        assert_eq!(event.payload["data"], "Hello");
        assert_eq!(event.payload["correlationId"], "k1");
        assert_eq!(event.payload["windowLabel"], "main");
    }

    #[tokio::test(start_paused = true)]
    async fn ignores_events_for_other_windows() {
        let bus = EventBus::new();
        let _task = Webview::new("main", Document::new(10.0, 10.0), bus.clone()).spawn();
        let mut rx = bus.subscribe();

        assert_eq!(bus.emit_to("side", names::GET_DOM, json!({})), 0);
        let res = tokio::time::timeout(
            Duration::from_secs(1),
            next_named(&mut rx, "get-dom-response"),
        )
        .await;
        assert!(res.is_err());
    }

    #[tokio::test]
    async fn handlers_run_one_at_a_time() {
        let bus = EventBus::new();
        let _task = Webview::new("main", Document::new(10.0, 10.0), bus.clone()).spawn();
        let mut rx = bus.subscribe();

        bus.emit_to(
            "main",
            names::LOCAL_STORAGE,
            json!({"action": "set", "key": "n", "value": "1", "correlationId": "a"}),
        );
        bus.emit_to(
            "main",
            names::LOCAL_STORAGE,
            json!({"action": "get", "key": "n", "correlationId": "b"}),
        );
        let first = next_named(&mut rx, "local-storage-response").await;
        let second = next_named(&mut rx, "local-storage-response").await;
        assert_eq!(first.payload["correlationId"], "a");
        assert_eq!(second.payload["correlationId"], "b");
        assert_eq!(second.payload["data"], "1");
    }

    #[tokio::test(start_paused = true)]
    async fn slow_handler_delays_but_never_drops_queued_events() {
        let bus = EventBus::new();
        let mut doc = Document::new(400.0, 300.0);
        let body = doc.body();
        let input = doc.append_element(body, "input", &[("id", "q")]);
        doc.set_rect(input, Rect::new(0.0, 0.0, 100.0, 20.0));
        let _task = Webview::new("main", doc, bus.clone()).spawn();
        let mut rx = bus.subscribe();

        bus.emit_to(
            "main",
            names::SEND_TEXT_TO_ELEMENT,
            json!({
                "selectorType": "id",
                "selectorValue": "q",
                "text": "0123456789",
                "delayMs": 100,
                "correlationId": "typing"
            }),
        );
        for n in 0..300 {
            bus.emit_to("main", names::GET_DOM, json!({"correlationId": format!("dom-{n}")}));
        }

        let typed = rx.recv().await.unwrap();
        assert_eq!(typed.name, "send-text-to-element-response");
        assert_eq!(typed.payload["success"], true);

        let mut answered = HashSet::new();
        for _ in 0..300 {
            let event = rx.recv().await.unwrap();
            assert_eq!(event.name, "get-dom-response");
            let id = event.payload["correlationId"].as_str().unwrap().to_string();
            assert!(answered.insert(id), "duplicate response");
        }
        assert_eq!(answered.len(), 300);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn unknown_events_still_get_one_response() {
        let bus = EventBus::new();
        let _task = Webview::new("main", Document::new(10.0, 10.0), bus.clone()).spawn();
        let mut rx = bus.subscribe();

        bus.emit_to("main", "reload", json!({"correlationId": "r"}));
        let event = next_named(&mut rx, "reload-response").await;
        assert_eq!(event.payload["success"], false);
        assert_eq!(event.payload["correlationId"], "r");
    }
}
