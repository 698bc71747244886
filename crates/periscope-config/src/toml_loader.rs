//! TOML config file loading.

use std::path::{Path, PathBuf};

use periscope_common::ConfigError;
use tracing::{info, warn};

use crate::schema::PeriscopeConfig;
use crate::validation;

/// Load config from a specific TOML file path.
///
/// Deserializes the file using serde defaults for any missing fields. If
/// validation fails, a warning is logged and the default config is returned.
pub fn load_from_path(path: &Path) -> Result<PeriscopeConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path).map_err(|e| {
        ConfigError::ParseError(format!("failed to read {}: {e}", path.display()))
    })?;

    let config = parse_str(&content)?;

    if let Err(e) = validation::validate(&config) {
        warn!("config validation warning: {e}");
        warn!("falling back to default config");
        return Ok(PeriscopeConfig::default());
    }

    info!("loaded config from {}", path.display());
    Ok(config)
}

/// Parse config from TOML text without validating it.
pub fn parse_str(content: &str) -> Result<PeriscopeConfig, ConfigError> {
    toml::from_str(content)
        .map_err(|e| ConfigError::ParseError(format!("failed to parse TOML: {e}")))
}

/// Load config from the platform-specific default path.
///
/// On Linux: `~/.config/periscope/config.toml`
/// On macOS: `~/Library/Application Support/periscope/config.toml`
pub fn load_default() -> Result<PeriscopeConfig, ConfigError> {
    let path = default_config_path()?;

    if !path.exists() {
        info!("no config found at {}, using defaults", path.display());
        return Ok(PeriscopeConfig::default());
    }

    load_from_path(&path)
}

/// Get the platform-specific default config file path.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    let config_dir = dirs::config_dir().ok_or_else(|| {
        ConfigError::ParseError("could not determine config directory".into())
    })?;
    Ok(config_dir.join("periscope").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::TransportKind;

    #[test]
    fn load_from_nonexistent_returns_file_not_found() {
        let result = load_from_path(Path::new("/tmp/nonexistent_periscope_config.toml"));
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn load_valid_partial_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[transport]
kind = "tcp"
port = 4000

[screenshot]
quality = 60
"#,
        )
        .unwrap();

        let config = load_from_path(&path).unwrap();
        assert_eq!(config.transport.kind, TransportKind::Tcp);
        assert_eq!(config.transport.port, 4000);
        assert_eq!(config.screenshot.quality, 60);
        // Defaults preserved
        assert_eq!(config.screenshot.max_width, 1920);
        assert_eq!(config.bridge.default_timeout_ms, 5_000);
        assert_eq!(config.windows.default_label, "main");
    }

    #[test]
    fn load_invalid_toml_returns_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "this is not valid toml {{{").unwrap();

        let result = load_from_path(&path);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn load_config_with_invalid_values_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[screenshot]\nquality = 0\n").unwrap();

        let config = load_from_path(&path).unwrap();
        assert_eq!(config.screenshot.quality, 85);
    }

    #[test]
    fn aliases_parse_from_table() {
        let config = parse_str(
            r#"
[windows]
default_label = "app"

[windows.aliases]
app = "app-webview"
"#,
        )
        .unwrap();
        assert_eq!(config.windows.default_label, "app");
        assert_eq!(
            config.windows.aliases.get("app").map(String::as_str),
            Some("app-webview")
        );
        assert!(!config.windows.aliases.contains_key("main"));
    }

    #[test]
    fn default_path_ends_with_periscope_config() {
        if let Ok(path) = default_config_path() {
            assert!(path.ends_with("periscope/config.toml"));
        }
    }
}
