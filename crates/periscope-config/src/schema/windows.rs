use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Window label resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowsConfig {
    /// Label used when a request names no window.
    pub default_label: String,
    /// Fallback labels tried when a requested label does not exist
    /// (a "main" window hosting a child "preview" webview, for example).
    pub aliases: BTreeMap<String, String>,
}

impl Default for WindowsConfig {
    fn default() -> Self {
        let mut aliases = BTreeMap::new();
        aliases.insert("main".to_string(), "preview".to_string());
        Self {
            default_label: periscope_common::DEFAULT_WINDOW_LABEL.into(),
            aliases,
        }
    }
}
