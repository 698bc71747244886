//! Routes one socket request to a native handler or a webview.

use std::sync::Arc;

use async_trait::async_trait;
use periscope_common::{BridgeError, Request, Response, WindowRegistry};
use periscope_config::PeriscopeConfig;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::bridge::Bridge;
use crate::commands::{Command, NativeCommand, WebviewCommand};

/// Host-side implementation of the native commands other than `ping`.
#[async_trait]
pub trait NativeHost: Send + Sync {
    async fn execute(&self, command: NativeCommand, params: Value) -> Result<Value, BridgeError>;
}

/// A host without platform integrations.
pub struct UnsupportedHost;

#[async_trait]
impl NativeHost for UnsupportedHost {
    async fn execute(&self, command: NativeCommand, _params: Value) -> Result<Value, BridgeError> {
        Err(BridgeError::Execution(format!(
            "{} is not supported by this host",
            command.name()
        )))
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    config: Arc<PeriscopeConfig>,
    windows: Arc<dyn WindowRegistry>,
    native: Arc<dyn NativeHost>,
}

impl Dispatcher {
    pub fn new(config: Arc<PeriscopeConfig>, windows: Arc<dyn WindowRegistry>) -> Self {
        Self {
            config,
            windows,
            native: Arc::new(UnsupportedHost),
        }
    }

    pub fn with_native_host(mut self, native: Arc<dyn NativeHost>) -> Self {
        self.native = native;
        self
    }

    pub fn config(&self) -> &PeriscopeConfig {
        &self.config
    }

    /// Resolve a requested window label to one that exists.
    ///
    /// An exact match wins; otherwise a configured alias is tried (a host
    /// with several webviews keeps its page in `preview`, not `main`).
    pub fn resolve_window(&self, requested: Option<&str>) -> Result<String, BridgeError> {
        let label = requested.unwrap_or(&self.config.windows.default_label);
        if self.windows.contains(label) {
            return Ok(label.to_string());
        }
        if let Some(alias) = self.config.windows.aliases.get(label) {
            if self.windows.contains(alias) {
                debug!(requested = label, resolved = %alias, "window resolved through alias");
                return Ok(alias.clone());
            }
        }
        Err(BridgeError::WindowNotFound(label.to_string()))
    }

    /// Produce the single response for `request`.
    pub async fn dispatch(&self, bridge: &Bridge, request: Request) -> Response {
        let Request {
            id,
            command: name,
            params,
        } = request;
        let result = match Command::parse(&name) {
            Ok(Command::Native(command)) => self.run_native(command, params).await,
            Ok(Command::Webview(command)) => self.delegate(bridge, command, params).await,
            Err(e) => Err(e),
        };
        match result {
            Ok((data, warning)) => {
                debug!(command = %name, "request completed");
                let response = Response::ok(id, data);
                match warning {
                    Some(w) => {
                        warn!(command = %name, warning = %w, "request completed with warning");
                        response.with_warning(&w)
                    }
                    None => response,
                }
            }
            Err(e) => {
                warn!(command = %name, code = ?e.code(), error = %e, "request failed");
                Response::failure(id, &e)
            }
        }
    }

    async fn run_native(
        &self,
        command: NativeCommand,
        params: Value,
    ) -> Result<(Value, Option<BridgeError>), BridgeError> {
        let data = match command {
            NativeCommand::Ping => json!({"value": params.get("value").cloned().unwrap_or(Value::Null)}),
            other => self.native.execute(other, params).await?,
        };
        Ok((data, None))
    }

    async fn delegate(
        &self,
        bridge: &Bridge,
        command: WebviewCommand,
        params: Value,
    ) -> Result<(Value, Option<BridgeError>), BridgeError> {
        let forward = command.prepare(params, &self.config)?;
        let label = self.resolve_window(forward.window_label.as_deref())?;
        debug!(
            command = command.name(),
            label = %label,
            timeout_ms = forward.timeout.as_millis() as u64,
            "forwarding to webview"
        );
        let reply = bridge
            .request(&label, command.event_name(), forward.payload, forward.timeout)
            .await?;
        if !reply.success {
            let message = reply
                .error
                .unwrap_or_else(|| "unknown error occurred".to_string());
            return Err(BridgeError::from_handler(reply.code, message));
        }
        let shaped = command.shape(reply.data.unwrap_or(Value::Null));
        Ok((shaped.data, shaped.warning))
    }
}
