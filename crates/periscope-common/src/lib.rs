//! Shared types for the periscope webview bridge.
//!
//! - [`envelope`]: socket request/response envelopes
//! - [`errors`]: error taxonomy and stable error codes
//! - [`events`]: the host <-> webview event bus
//! - [`id`]: request and correlation id generation
//! - [`payloads`]: typed payloads of forwarded webview events
//! - [`windows`]: the registry of open webview windows

pub mod envelope;
pub mod errors;
pub mod events;
pub mod id;
pub mod payloads;
pub mod windows;

pub use envelope::{Request, Response, Warning};
pub use errors::{BridgeError, ConfigError, ErrorCode, PeriscopeError};
pub use events::{
    names, response_event_name, BusEvent, EventBus, HandlerReply, Subscription, WindowInbox,
};
pub use id::{new_correlation_id, new_id};
pub use payloads::{SelectorKind, StorageAction};
pub use windows::WindowRegistry;

/// Window label used when a request does not name one.
pub const DEFAULT_WINDOW_LABEL: &str = "main";

pub type Result<T> = std::result::Result<T, PeriscopeError>;
