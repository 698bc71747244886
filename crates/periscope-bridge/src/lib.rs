//! Host side of the webview bridge.
//!
//! - [`commands`]: command classification, params and result shaping
//! - [`dispatcher`]: routes a request to a native handler or a webview
//! - [`bridge`]: emit-and-wait over the event bus with deadlines
//! - [`pending`]: the exactly-once table of requests awaiting a response

pub mod bridge;
pub mod commands;
pub mod dispatcher;
pub mod pending;

pub use bridge::Bridge;
pub use commands::{Command, NativeCommand, WebviewCommand};
pub use dispatcher::{Dispatcher, NativeHost, UnsupportedHost};
pub use pending::{PendingTable, Settlement};
