//! Full configuration validation.
//!
//! Each check pushes a message; all errors are reported in a single
//! `ConfigError`.

mod helpers;

#[cfg(test)]
mod tests;

use periscope_common::ConfigError;

use crate::schema::{PeriscopeConfig, TransportKind};

use self::helpers::{validate_non_empty, validate_non_zero, validate_range};

/// Run all validations on a config, collecting all errors.
pub fn validate(config: &PeriscopeConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    validate_transport(&mut errors, config);
    validate_bridge(&mut errors, config);
    validate_windows(&mut errors, config);
    validate_screenshot(&mut errors, config);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}

fn validate_transport(errors: &mut Vec<String>, config: &PeriscopeConfig) {
    let transport = &config.transport;
    match transport.kind {
        TransportKind::Tcp => {
            validate_non_zero(errors, "transport.port", transport.port as u64);
            validate_non_empty(errors, "transport.host", &transport.host);
        }
        TransportKind::Unix => {
            if transport.socket_path.as_os_str().is_empty() {
                errors.push("transport.socket_path must not be empty".into());
            }
        }
    }
    validate_non_zero(
        errors,
        "transport.max_frame_bytes",
        transport.max_frame_bytes as u64,
    );
}

fn validate_bridge(errors: &mut Vec<String>, config: &PeriscopeConfig) {
    let bridge = &config.bridge;
    validate_non_zero(errors, "bridge.default_timeout_ms", bridge.default_timeout_ms);
    validate_non_zero(
        errors,
        "bridge.send_text_timeout_ms",
        bridge.send_text_timeout_ms,
    );
    validate_non_zero(
        errors,
        "bridge.screenshot_timeout_ms",
        bridge.screenshot_timeout_ms,
    );
    validate_non_zero(
        errors,
        "bridge.iframe_rpc_timeout_ms",
        bridge.iframe_rpc_timeout_ms,
    );
}

fn validate_windows(errors: &mut Vec<String>, config: &PeriscopeConfig) {
    validate_non_empty(errors, "windows.default_label", &config.windows.default_label);
    for (from, to) in &config.windows.aliases {
        if from == to {
            errors.push(format!("windows.aliases.{from} points at itself"));
        }
    }
}

fn validate_screenshot(errors: &mut Vec<String>, config: &PeriscopeConfig) {
    let shot = &config.screenshot;
    validate_range(errors, "screenshot.quality", shot.quality as u64, 1, 100);
    validate_non_zero(errors, "screenshot.max_width", shot.max_width as u64);
    validate_non_zero(errors, "screenshot.frame_timeout_ms", shot.frame_timeout_ms);
    validate_non_zero(errors, "screenshot.max_children", shot.max_children as u64);
}
