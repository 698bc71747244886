use serde::{Deserialize, Serialize};

/// Defaults for the in-webview screenshot pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenshotConfig {
    /// JPEG quality, 1-100.
    pub quality: u8,
    /// Output width cap in pixels; wider viewports are scaled down.
    pub max_width: u32,
    /// How long to wait for each nested frame's self-capture.
    pub frame_timeout_ms: u64,
    /// Children styled per nesting level when inlining styles.
    pub max_children: usize,
}

impl Default for ScreenshotConfig {
    fn default() -> Self {
        Self {
            quality: 85,
            max_width: 1920,
            frame_timeout_ms: 5_000,
            max_children: 500,
        }
    }
}
