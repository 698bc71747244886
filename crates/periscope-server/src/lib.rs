//! The periscope socket server.
//!
//! Accepts NDJSON requests over a Unix socket or TCP, dispatches each one
//! through [`periscope_bridge`] and writes back exactly one response per
//! request id.

pub mod connection;
#[cfg(feature = "desktop")]
pub mod desktop;
pub mod guest;
pub mod listener;
pub mod session;

use std::sync::Arc;

use periscope_bridge::Dispatcher;
use periscope_common::EventBus;
use periscope_config::PeriscopeConfig;
use periscope_dom::Document;
use periscope_webview::{HandlerSettings, WebviewRegistry};

pub use connection::{handle_connection, ServerContext};
pub use listener::{Endpoint, Listener};
pub use session::Session;

/// Default page size for windows opened without one.
pub const DEFAULT_VIEWPORT: (f64, f64) = (1280.0, 800.0);

/// A bus, a window registry and a dispatcher wired together from config.
pub struct Host {
    pub bus: EventBus,
    pub windows: WebviewRegistry,
    pub dispatcher: Dispatcher,
    pub max_frame_bytes: usize,
}

impl Host {
    pub fn new(config: PeriscopeConfig) -> Self {
        let bus = EventBus::new();
        let windows = WebviewRegistry::new(
            bus.clone(),
            HandlerSettings {
                screenshot: config.screenshot.clone(),
            },
        );
        let max_frame_bytes = config.transport.max_frame_bytes;
        let dispatcher = Dispatcher::new(Arc::new(config), Arc::new(windows.clone()));
        Self {
            bus,
            windows,
            dispatcher,
            max_frame_bytes,
        }
    }

    /// Open the configured default window with a blank page.
    pub fn open_default_window(&self) {
        let label = self.dispatcher.config().windows.default_label.clone();
        let (width, height) = DEFAULT_VIEWPORT;
        self.windows.open(&label, Document::new(width, height));
    }

    pub fn context(&self) -> ServerContext {
        ServerContext {
            dispatcher: self.dispatcher.clone(),
            bus: self.bus.clone(),
            max_frame_bytes: self.max_frame_bytes,
        }
    }
}
