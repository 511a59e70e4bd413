//! appshare configuration system.
//!
//! TOML-based configuration with environment overrides, validation and
//! live reload. All sections use defaults so partial files work.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use appshare_config::{load_config, config_to_json};
//!
//! let config = load_config().expect("failed to load config");
//! println!("{}", config_to_json(&config));
//! ```

pub mod env;
pub mod reload;
pub mod schema;
pub mod toml_loader;
pub mod validation;
pub mod watcher;

pub use reload::ReloadManager;
pub use schema::*;
pub use watcher::ConfigWatcher;

use appshare_common::ConfigError;

/// Load `config.toml` from the OS config directory, creating it if needed.
pub fn load_config() -> Result<AppShareConfig, ConfigError> {
    toml_loader::load_default()
}

/// Serialize a config to a pretty-printed JSON string.
pub fn config_to_json(config: &AppShareConfig) -> String {
    serde_json::to_string_pretty(config)
        .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize config: {e}\"}}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_to_json_contains_all_sections() {
        let json = config_to_json(&AppShareConfig::default());
        for section in [
            "\"apps\"",
            "\"health\"",
            "\"restart\"",
            "\"capture\"",
            "\"layout\"",
            "\"sessions\"",
            "\"server\"",
            "\"logging\"",
        ] {
            assert!(json.contains(section), "missing {section}");
        }
    }

    #[test]
    fn config_schema_version_is_1() {
        assert_eq!(CONFIG_SCHEMA_VERSION, 1);
    }

    #[test]
    fn json_output_parses_back() {
        let json = config_to_json(&AppShareConfig::default());
        let parsed: AppShareConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.apps.allowed.len(), 5);
        assert_eq!(parsed.logging.level, LogLevel::Info);
    }
}
