//! Tests for config validation.

use super::*;
use crate::schema::PeriscopeConfig;

#[test]
fn default_config_is_valid() {
    assert!(validate(&PeriscopeConfig::default()).is_ok());
}

#[test]
fn quality_out_of_range_is_rejected() {
    let mut config = PeriscopeConfig::default();
    config.screenshot.quality = 101;
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("screenshot.quality = 101"));
}

#[test]
fn zero_port_rejected_only_for_tcp() {
    let mut config = PeriscopeConfig::default();
    config.transport.port = 0;
    config.transport.kind = TransportKind::Unix;
    assert!(validate(&config).is_ok());

    config.transport.kind = TransportKind::Tcp;
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("transport.port"));
}

#[test]
fn errors_are_collected() {
    let mut config = PeriscopeConfig::default();
    config.bridge.default_timeout_ms = 0;
    config.screenshot.max_width = 0;
    config.windows.default_label = " ".into();
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("bridge.default_timeout_ms"));
    assert!(err.contains("screenshot.max_width"));
    assert!(err.contains("windows.default_label"));
}

#[test]
fn self_alias_is_rejected() {
    let mut config = PeriscopeConfig::default();
    config
        .windows
        .aliases
        .insert("preview".into(), "preview".into());
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("windows.aliases.preview"));
}
