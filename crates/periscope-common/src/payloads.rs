//! Payloads of the events the host forwards to webview handlers.
//!
//! The host parses socket params (snake_case) and forwards these camelCase
//! payloads; the bridge adds a `correlationId` key to every one of them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How an element is located.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectorKind {
    Id,
    Class,
    Tag,
    Text,
}

impl SelectorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Class => "class",
            Self::Tag => "tag",
            Self::Text => "text",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageAction {
    Get,
    Set,
    Remove,
    Clear,
    Keys,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalStoragePayload {
    pub action: StorageAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteJsPayload {
    pub script: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementPositionPayload {
    pub selector_type: SelectorKind,
    pub selector_value: String,
    #[serde(default)]
    pub should_click: bool,
    #[serde(default)]
    pub raw_coordinates: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendTextPayload {
    pub selector_type: SelectorKind,
    pub selector_value: String,
    pub text: String,
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

fn default_delay_ms() -> u64 {
    20
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturePayload {
    pub quality: u8,
    pub max_width: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IframeRpcPayload {
    pub method: String,
    #[serde(default)]
    pub args: Vec<Value>,
    /// Element id of the target `<iframe>`; the first iframe when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_id: Option<String>,
    pub timeout_ms: u64,
}
