//! Socket command names, their parameters and how their results are shaped.
//!
//! Commands are either native (answered on the host) or forwarded to a
//! webview as an event. Socket params are snake_case; forwarded payloads
//! are the camelCase types in [`periscope_common::payloads`].

use std::time::Duration;

use periscope_common::payloads::{
    CapturePayload, ElementPositionPayload, ExecuteJsPayload, IframeRpcPayload,
    LocalStoragePayload, SendTextPayload,
};
use periscope_common::{names, BridgeError, SelectorKind, StorageAction};
use periscope_config::PeriscopeConfig;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeCommand {
    Ping,
    TakeScreenshot,
    ManageWindow,
    SimulateTextInput,
    SimulateMouseMovement,
}

impl NativeCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ping => "ping",
            Self::TakeScreenshot => "take_screenshot",
            Self::ManageWindow => "manage_window",
            Self::SimulateTextInput => "simulate_text_input",
            Self::SimulateMouseMovement => "simulate_mouse_movement",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebviewCommand {
    GetDom,
    LocalStorage,
    ExecuteJs,
    GetElementPosition,
    SendTextToElement,
    CaptureScreenshot,
    IframeRpc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Native(NativeCommand),
    Webview(WebviewCommand),
}

impl Command {
    pub const ALL: [Command; 12] = [
        Command::Native(NativeCommand::Ping),
        Command::Native(NativeCommand::TakeScreenshot),
        Command::Native(NativeCommand::ManageWindow),
        Command::Native(NativeCommand::SimulateTextInput),
        Command::Native(NativeCommand::SimulateMouseMovement),
        Command::Webview(WebviewCommand::GetDom),
        Command::Webview(WebviewCommand::LocalStorage),
        Command::Webview(WebviewCommand::ExecuteJs),
        Command::Webview(WebviewCommand::GetElementPosition),
        Command::Webview(WebviewCommand::SendTextToElement),
        Command::Webview(WebviewCommand::CaptureScreenshot),
        Command::Webview(WebviewCommand::IframeRpc),
    ];

    pub fn parse(name: &str) -> Result<Self, BridgeError> {
        Self::ALL
            .into_iter()
            .find(|c| c.name() == name)
            .ok_or_else(|| BridgeError::UnknownCommand(name.to_string()))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Native(c) => c.name(),
            Self::Webview(c) => c.name(),
        }
    }
}

/// A delegated command ready to go on the bus.
#[derive(Debug, Clone, PartialEq)]
pub struct Forward {
    /// Window the caller named; `None` means the default window.
    pub window_label: Option<String>,
    pub payload: Value,
    /// How long the host waits for the response.
    pub timeout: Duration,
}

/// A successful handler result as returned to the socket client.
#[derive(Debug, Clone, PartialEq)]
pub struct Shaped {
    pub data: Value,
    pub warning: Option<BridgeError>,
}

impl Shaped {
    fn plain(data: Value) -> Self {
        Self {
            data,
            warning: None,
        }
    }
}

// =============================================================================
// Socket params
// =============================================================================

#[derive(Debug, Deserialize)]
struct LocalStorageParams {
    window_label: Option<String>,
    action: StorageAction,
    key: Option<String>,
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExecuteJsParams {
    window_label: Option<String>,
    script: String,
    timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ElementPositionParams {
    window_label: Option<String>,
    selector_type: SelectorKind,
    selector_value: String,
    #[serde(default)]
    should_click: bool,
    #[serde(default)]
    raw_coordinates: bool,
}

#[derive(Debug, Deserialize)]
struct SendTextParams {
    window_label: Option<String>,
    selector_type: SelectorKind,
    selector_value: String,
    text: String,
    #[serde(default = "default_delay_ms")]
    delay_ms: u64,
}

fn default_delay_ms() -> u64 {
    20
}

#[derive(Debug, Default, Deserialize)]
struct CaptureParams {
    window_label: Option<String>,
    quality: Option<u8>,
    max_width: Option<u32>,
    timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct IframeRpcParams {
    window_label: Option<String>,
    method: String,
    #[serde(default)]
    args: Vec<Value>,
    timeout_ms: Option<u64>,
    frame_id: Option<String>,
}

impl WebviewCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::GetDom => "get_dom",
            Self::LocalStorage => "local_storage",
            Self::ExecuteJs => "execute_js",
            Self::GetElementPosition => "get_element_position",
            Self::SendTextToElement => "send_text_to_element",
            Self::CaptureScreenshot => "capture_screenshot",
            Self::IframeRpc => "iframe_rpc",
        }
    }

    /// Name of the event forwarded to the webview.
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::GetDom => names::GET_DOM,
            Self::LocalStorage => names::LOCAL_STORAGE,
            Self::ExecuteJs => names::EXECUTE_JS,
            Self::GetElementPosition => names::GET_ELEMENT_POSITION,
            Self::SendTextToElement => names::SEND_TEXT_TO_ELEMENT,
            Self::CaptureScreenshot => names::CAPTURE_SCREENSHOT,
            Self::IframeRpc => names::IFRAME_RPC,
        }
    }

    /// Validate socket params and build the forwarded event.
    pub fn prepare(&self, params: Value, config: &PeriscopeConfig) -> Result<Forward, BridgeError> {
        let bridge = &config.bridge;
        let default_timeout = bridge.default_timeout();
        match self {
            Self::GetDom => Ok(Forward {
                window_label: label_param(self, &params)?,
                payload: json!({}),
                timeout: default_timeout,
            }),
            Self::LocalStorage => {
                let p: LocalStorageParams = self.parse(params)?;
                if p.key.is_none()
                    && matches!(
                        p.action,
                        StorageAction::Get | StorageAction::Set | StorageAction::Remove
                    )
                {
                    return Err(self.invalid("key is required for this action"));
                }
                if p.value.is_none() && p.action == StorageAction::Set {
                    return Err(self.invalid("value is required for set"));
                }
                Ok(Forward {
                    window_label: p.window_label,
                    payload: to_payload(&LocalStoragePayload {
                        action: p.action,
                        key: p.key,
                        value: p.value,
                    }),
                    timeout: default_timeout,
                })
            }
            Self::ExecuteJs => {
                let p: ExecuteJsParams = self.parse(params)?;
                Ok(Forward {
                    window_label: p.window_label,
                    payload: to_payload(&ExecuteJsPayload { script: p.script }),
                    timeout: p.timeout_ms.map(Duration::from_millis).unwrap_or(default_timeout),
                })
            }
            Self::GetElementPosition => {
                let p: ElementPositionParams = self.parse(params)?;
                Ok(Forward {
                    window_label: p.window_label,
                    payload: to_payload(&ElementPositionPayload {
                        selector_type: p.selector_type,
                        selector_value: p.selector_value,
                        should_click: p.should_click,
                        raw_coordinates: p.raw_coordinates,
                    }),
                    timeout: default_timeout,
                })
            }
            Self::SendTextToElement => {
                let p: SendTextParams = self.parse(params)?;
                // Typing takes at least one delay per character.
                let typing = Duration::from_millis(p.delay_ms)
                    .saturating_mul(p.text.chars().count() as u32);
                let timeout = Duration::from_millis(bridge.send_text_timeout_ms)
                    .max(typing + default_timeout);
                Ok(Forward {
                    window_label: p.window_label,
                    payload: to_payload(&SendTextPayload {
                        selector_type: p.selector_type,
                        selector_value: p.selector_value,
                        text: p.text,
                        delay_ms: p.delay_ms,
                    }),
                    timeout,
                })
            }
            Self::CaptureScreenshot => {
                let p: CaptureParams = match params {
                    Value::Null => CaptureParams::default(),
                    Value::String(label) => CaptureParams {
                        window_label: Some(label),
                        ..Default::default()
                    },
                    other => self.parse(other)?,
                };
                let quality = p.quality.unwrap_or(config.screenshot.quality);
                if !(1..=100).contains(&quality) {
                    return Err(self.invalid("quality must be between 1 and 100"));
                }
                let max_width = p.max_width.unwrap_or(config.screenshot.max_width);
                if max_width == 0 {
                    return Err(self.invalid("max_width must be positive"));
                }
                Ok(Forward {
                    window_label: p.window_label,
                    payload: to_payload(&CapturePayload { quality, max_width }),
                    timeout: Duration::from_millis(
                        p.timeout_ms.unwrap_or(bridge.screenshot_timeout_ms),
                    ),
                })
            }
            Self::IframeRpc => {
                let p: IframeRpcParams = self.parse(params)?;
                let timeout_ms = p.timeout_ms.unwrap_or(bridge.iframe_rpc_timeout_ms);
                Ok(Forward {
                    window_label: p.window_label,
                    payload: to_payload(&IframeRpcPayload {
                        method: p.method,
                        args: p.args,
                        frame_id: p.frame_id,
                        timeout_ms,
                    }),
                    // The webview enforces the call deadline; the host waits a
                    // little longer so that its timeout is reported, not ours.
                    timeout: Duration::from_millis(timeout_ms) + bridge.grace(),
                })
            }
        }
    }

    /// Turn a successful handler's `data` into the socket result.
    pub fn shape(&self, data: Value) -> Shaped {
        match self {
            Self::CaptureScreenshot => shape_capture(data),
            Self::IframeRpc => Shaped::plain(shape_iframe_reply(&data)),
            _ => Shaped::plain(data),
        }
    }

    fn parse<T: DeserializeOwned>(&self, params: Value) -> Result<T, BridgeError> {
        serde_json::from_value(params).map_err(|e| self.invalid(&e.to_string()))
    }

    fn invalid(&self, reason: &str) -> BridgeError {
        BridgeError::InvalidParams {
            command: self.name().to_string(),
            reason: reason.to_string(),
        }
    }
}

/// `get_dom` takes the window label as a bare string or inside an object.
fn label_param(command: &WebviewCommand, params: &Value) -> Result<Option<String>, BridgeError> {
    match params {
        Value::Null => Ok(None),
        Value::String(label) => Ok(Some(label.clone())),
        Value::Object(map) => match map.get("window_label") {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(label)) => Ok(Some(label.clone())),
            Some(_) => Err(command.invalid("window_label must be a string")),
        },
        _ => Err(command.invalid("expected a window label or an object")),
    }
}

fn to_payload<T: serde::Serialize>(payload: &T) -> Value {
    serde_json::to_value(payload).unwrap_or(Value::Null)
}

fn shape_capture(data: Value) -> Shaped {
    let omitted = data
        .get("omittedFrames")
        .and_then(Value::as_u64)
        .unwrap_or(0) as usize;
    let result = json!({
        "data": data.get("data").cloned().unwrap_or(Value::Null),
        "success": true,
        "error": null,
        "width": data.get("width").cloned().unwrap_or(Value::Null),
        "height": data.get("height").cloned().unwrap_or(Value::Null),
        "strategy": data.get("strategy").cloned().unwrap_or(Value::Null),
        "omittedFrames": omitted,
    });
    Shaped {
        data: result,
        warning: (omitted > 0).then_some(BridgeError::PartialResult { omitted }),
    }
}

/// `error` values of `null`, `false` and `""` mean the call succeeded.
fn is_real_error(error: &Value) -> bool {
    match error {
        Value::Null | Value::Bool(false) => false,
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

fn shape_iframe_reply(data: &Value) -> Value {
    let error = data.get("error").unwrap_or(&Value::Null);
    if is_real_error(error) {
        let message = match error {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        json!({"success": false, "result": null, "error": message})
    } else {
        json!({
            "success": true,
            "result": data.get("result").cloned().unwrap_or(Value::Null),
            "error": null,
        })
    }
}
