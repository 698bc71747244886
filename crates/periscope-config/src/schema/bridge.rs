use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Host-side wait deadlines for webview-delegated commands, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub default_timeout_ms: u64,
    pub send_text_timeout_ms: u64,
    pub screenshot_timeout_ms: u64,
    pub iframe_rpc_timeout_ms: u64,
    /// Added to a caller-supplied in-webview deadline so the webview's own
    /// timeout reply can still arrive before the host gives up.
    pub grace_ms: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: 5_000,
            send_text_timeout_ms: 30_000,
            screenshot_timeout_ms: 30_000,
            iframe_rpc_timeout_ms: 10_000,
            grace_ms: 1_000,
        }
    }
}

impl BridgeConfig {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    pub fn grace(&self) -> Duration {
        Duration::from_millis(self.grace_ms)
    }
}
