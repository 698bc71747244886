//! Configuration schema types for periscope.
//!
//! All structs use `serde(default)` so partial configs work correctly.

mod bridge;
mod screenshot;
mod transport;
mod windows;

pub use bridge::*;
pub use screenshot::*;
pub use transport::*;
pub use windows::*;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PeriscopeConfig {
    pub transport: TransportConfig,
    pub bridge: BridgeConfig,
    pub windows: WindowsConfig,
    pub screenshot: ScreenshotConfig,
    pub logging: LoggingConfig,
}

/// Logging options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "periscope=info".into(),
        }
    }
}
