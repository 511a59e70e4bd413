//! Read a config file from an explicit path or the platform default.

use crate::env::apply_env_overrides;
use crate::schema::AppShareConfig;
use crate::validation;
use appshare_common::ConfigError;
use std::path::Path;
use tracing::{debug, info};

use super::paths::{create_default_config, default_config_path};

/// Parse TOML text into a config, filling missing fields with defaults.
pub fn parse_config(content: &str) -> Result<AppShareConfig, ConfigError> {
    toml::from_str(content).map_err(|e| ConfigError::ParseError(format!("invalid TOML: {e}")))
}

/// Load, apply environment overrides and validate the file at `path`.
///
/// Out-of-range values are a `ValidationError`, not a warning.
pub fn load_from_path(path: &Path) -> Result<AppShareConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::ParseError(format!("failed to read {}: {e}", path.display())))?;

    let mut config = parse_config(&content)?;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validation::validate(&config)?;

    info!(path = %path.display(), "loaded config");
    Ok(config)
}

/// Load config from the platform-specific default path.
///
/// On Linux: `~/.config/appshare/config.toml`
///
/// A missing file is created from the commented template first.
pub fn load_default() -> Result<AppShareConfig, ConfigError> {
    let path = default_config_path()?;

    match load_from_path(&path) {
        Err(ConfigError::FileNotFound(_)) => {
            debug!(path = %path.display(), "no config file, writing template");
            create_default_config(&path)?;
            load_from_path(&path)
        }
        other => other,
    }
}
