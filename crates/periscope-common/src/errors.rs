use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("config parse error: {0}")]
    ParseError(String),

    #[error("config validation error: {0}")]
    ValidationError(String),
}

/// Stable, client-visible error codes carried in response envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    TransportError,
    UnknownCommand,
    WindowNotFound,
    ElementNotFound,
    Timeout,
    ExecutionError,
    PartialResult,
    InvalidParams,
    Cancelled,
}

/// Failures surfaced to an external client for a single request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BridgeError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("window not found: {0}")]
    WindowNotFound(String),

    #[error("element not found: {0}")]
    ElementNotFound(String),

    #[error("timed out after {timeout_ms}ms waiting for {event}")]
    Timeout { event: String, timeout_ms: u64 },

    /// A deadline inside the webview expired, e.g. an iframe call.
    #[error("{0}")]
    HandlerTimeout(String),

    #[error("execution error: {0}")]
    Execution(String),

    #[error("partial result: {omitted} nested frame(s) omitted")]
    PartialResult { omitted: usize },

    #[error("invalid params for {command}: {reason}")]
    InvalidParams { command: String, reason: String },

    #[error("request cancelled: {0}")]
    Cancelled(String),
}

impl BridgeError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Transport(_) => ErrorCode::TransportError,
            Self::UnknownCommand(_) => ErrorCode::UnknownCommand,
            Self::WindowNotFound(_) => ErrorCode::WindowNotFound,
            Self::ElementNotFound(_) => ErrorCode::ElementNotFound,
            Self::Timeout { .. } | Self::HandlerTimeout(_) => ErrorCode::Timeout,
            Self::Execution(_) => ErrorCode::ExecutionError,
            Self::PartialResult { .. } => ErrorCode::PartialResult,
            Self::InvalidParams { .. } => ErrorCode::InvalidParams,
            Self::Cancelled(_) => ErrorCode::Cancelled,
        }
    }

    /// Rebuild an error from a handler's `{code, error}` pair.
    ///
    /// Handlers only report element lookups, inner deadlines and execution
    /// failures; anything else collapses to `Execution`.
    pub fn from_handler(code: Option<ErrorCode>, message: String) -> Self {
        match code {
            Some(ErrorCode::ElementNotFound) => Self::ElementNotFound(message),
            Some(ErrorCode::Timeout) => Self::HandlerTimeout(message),
            _ => Self::Execution(message),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PeriscopeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let err = ConfigError::FileNotFound(PathBuf::from("/tmp/missing.toml"));
        assert_eq!(err.to_string(), "config file not found: /tmp/missing.toml");

        let err = ConfigError::ValidationError("quality out of range".into());
        assert_eq!(
            err.to_string(),
            "config validation error: quality out of range"
        );
    }

    #[test]
    fn bridge_error_codes() {
        assert_eq!(
            BridgeError::UnknownCommand("nope".into()).code(),
            ErrorCode::UnknownCommand
        );
        assert_eq!(
            BridgeError::Timeout {
                event: "get-dom".into(),
                timeout_ms: 5000
            }
            .code(),
            ErrorCode::Timeout
        );
        assert_eq!(
            BridgeError::Execution("boom".into()).code(),
            ErrorCode::ExecutionError
        );
    }

    #[test]
    fn timeout_display_names_event() {
        let err = BridgeError::Timeout {
            event: "capture-screenshot".into(),
            timeout_ms: 30000,
        };
        assert_eq!(
            err.to_string(),
            "timed out after 30000ms waiting for capture-screenshot"
        );
    }

    #[test]
    fn from_handler_keeps_element_not_found() {
        let err = BridgeError::from_handler(
            Some(ErrorCode::ElementNotFound),
            "no element with id 'x'".into(),
        );
        assert!(matches!(err, BridgeError::ElementNotFound(ref m) if m.contains("'x'")));

        let err = BridgeError::from_handler(Some(ErrorCode::Timeout), "iframe slow".into());
        assert_eq!(err.code(), ErrorCode::Timeout);
        assert_eq!(err.to_string(), "iframe slow");

        let err = BridgeError::from_handler(None, "TypeError".into());
        assert!(matches!(err, BridgeError::Execution(_)));
    }

    #[test]
    fn error_code_serializes_as_name() {
        let json = serde_json::to_string(&ErrorCode::WindowNotFound).unwrap();
        assert_eq!(json, "\"WindowNotFound\"");
    }

    #[test]
    fn periscope_error_from_bridge() {
        let err: PeriscopeError = BridgeError::WindowNotFound("main".into()).into();
        assert!(matches!(err, PeriscopeError::Bridge(_)));
        assert!(err.to_string().contains("main"));
    }
}
