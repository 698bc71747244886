//! periscope configuration.
//!
//! TOML-based configuration for the transport listener, bridge deadlines,
//! window resolution and screenshot defaults. Every section uses serde
//! defaults so partial configs work out of the box.

pub mod schema;
pub mod toml_loader;
pub mod validation;

pub use schema::{
    BridgeConfig, LoggingConfig, PeriscopeConfig, ScreenshotConfig, TransportConfig,
    TransportKind, WindowsConfig,
};

use periscope_common::ConfigError;

/// Load config from the platform default path, validating the result.
///
/// A missing file yields defaults; it is never created implicitly.
pub fn load_config() -> Result<PeriscopeConfig, ConfigError> {
    let config = toml_loader::load_default()?;
    validation::validate(&config)?;
    Ok(config)
}

/// Serialize a config to a pretty-printed JSON string.
pub fn config_to_json(config: &PeriscopeConfig) -> String {
    serde_json::to_string_pretty(config)
        .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize config: {e}\"}}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_to_json_contains_all_sections() {
        let json = config_to_json(&PeriscopeConfig::default());
        assert!(json.contains("\"transport\""));
        assert!(json.contains("\"bridge\""));
        assert!(json.contains("\"windows\""));
        assert!(json.contains("\"screenshot\""));
        assert!(json.contains("\"logging\""));
    }

    #[test]
    fn default_config_round_trips_through_json() {
        let json = config_to_json(&PeriscopeConfig::default());
        let parsed: PeriscopeConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.screenshot.quality, 85);
        assert_eq!(parsed.windows.default_label, "main");
    }
}
