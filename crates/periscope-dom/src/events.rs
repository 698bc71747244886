//! DOM events dispatched to elements.

use serde::Serialize;

/// A dispatched DOM event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DomEvent {
    /// Event type: `keydown`, `input`, `beforeinput`, `change`, `click`, ...
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_type: Option<String>,
}

impl DomEvent {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            key: None,
            data: None,
            input_type: None,
        }
    }

    pub fn key(kind: &str, key: char) -> Self {
        Self {
            key: Some(key.to_string()),
            ..Self::new(kind)
        }
    }

    pub fn input(data: Option<String>) -> Self {
        Self {
            data,
            input_type: Some("insertText".into()),
            ..Self::new("input")
        }
    }

    pub fn before_input(data: char) -> Self {
        Self {
            data: Some(data.to_string()),
            input_type: Some("insertText".into()),
            ..Self::new("beforeinput")
        }
    }
}
