//! The webview side of the bridge.
//!
//! Each open window runs a [`runtime::Webview`] task that owns its page and
//! answers forwarded events with exactly one `<event>-response`:
//! - [`handlers`]: DOM, storage, script, element position and typing
//! - [`capture`]: permission-free viewport screenshots
//! - [`rpc`] and [`frame_agent`]: correlated calls into embedded frames

pub mod capture;
pub mod frame_agent;
pub mod handlers;
pub mod lookup;
pub mod protocol;
pub mod registry;
pub mod rpc;
pub mod runtime;
pub mod typing;

pub use capture::{capture_viewport, Capture, CaptureOptions, Strategy};
pub use frame_agent::FrameAgent;
pub use handlers::{handle_event, HandlerError, HandlerSettings};
pub use registry::WebviewRegistry;
pub use runtime::Webview;
