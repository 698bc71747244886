//! Socket envelopes exchanged with external clients.
//!
//! One JSON object per frame. Requests carry a caller-assigned `id` that is
//! echoed verbatim on the single response produced for it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{BridgeError, ErrorCode};

/// An inbound request: `{id, command, params}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Opaque caller-assigned id (string or number).
    pub id: Value,
    pub command: String,
    #[serde(default)]
    pub params: Value,
}

/// A non-fatal condition attached to a successful response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Warning {
    pub code: ErrorCode,
    pub message: String,
}

/// An outbound response: `{id, success, data | error}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub id: Value,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<Warning>,
}

impl Response {
    pub fn ok(id: Value, data: Value) -> Self {
        Self {
            id,
            success: true,
            data: Some(data),
            error: None,
            code: None,
            warning: None,
        }
    }

    pub fn failure(id: Value, err: &BridgeError) -> Self {
        Self {
            id,
            success: false,
            data: None,
            error: Some(err.to_string()),
            code: Some(err.code()),
            warning: None,
        }
    }

    /// Attach a non-fatal warning derived from `err` to a successful response.
    pub fn with_warning(mut self, err: &BridgeError) -> Self {
        self.warning = Some(Warning {
            code: err.code(),
            message: err.to_string(),
        });
        self
    }

    /// Serialize as a single NDJSON line (without the trailing newline).
    pub fn to_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(
                "{{\"id\":null,\"success\":false,\"error\":\"failed to serialize response: {e}\"}}"
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_params_default_to_null() {
        let req: Request = serde_json::from_str(r#"{"id":1,"command":"ping"}"#).unwrap();
        assert_eq!(req.id, json!(1));
        assert_eq!(req.command, "ping");
        assert!(req.params.is_null());
    }

    #[test]
    fn ok_response_omits_error_fields() {
        let resp = Response::ok(json!("a"), json!({"value": 1}));
        let line = resp.to_line();
        assert!(line.contains("\"success\":true"));
        assert!(!line.contains("\"error\""));
        assert!(!line.contains("\"code\""));
    }

    #[test]
    fn failure_response_carries_code() {
        let resp = Response::failure(json!(7), &BridgeError::WindowNotFound("side".into()));
        let value: Value = serde_json::from_str(&resp.to_line()).unwrap();
        assert_eq!(value["id"], json!(7));
        assert_eq!(value["success"], json!(false));
        assert_eq!(value["code"], json!("WindowNotFound"));
        assert_eq!(value["error"], json!("window not found: side"));
        assert!(value.get("data").is_none());
    }

    #[test]
    fn warning_is_attached_to_success() {
        let resp = Response::ok(json!(1), json!({}))
            .with_warning(&BridgeError::PartialResult { omitted: 2 });
        assert!(resp.success);
        let warning = resp.warning.unwrap();
        assert_eq!(warning.code, ErrorCode::PartialResult);
        assert!(warning.message.contains('2'));
    }
}
