//! Full configuration validation.
//!
//! Each domain has its own submodule; this orchestrator calls them all
//! and collects errors into a single `ConfigError`.

mod apps;
mod capture;
mod health;
mod helpers;
mod layout;
mod misc;


use crate::schema::AppShareConfig;
use appshare_common::ConfigError;

/// Run all validations on a config, collecting all errors.
pub fn validate(config: &AppShareConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    apps::validate_apps(&mut errors, config);
    health::validate_health(&mut errors, config);
    health::validate_restart(&mut errors, config);
    capture::validate_capture(&mut errors, config);
    layout::validate_layout(&mut errors, config);
    misc::validate_sessions(&mut errors, config);
    misc::validate_server(&mut errors, config);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}
