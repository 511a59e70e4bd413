//! Application whitelist and launch validation.

use crate::schema::AppShareConfig;

use super::helpers::validate_range;

/// Validate the whitelist, concurrency cap and launch timings.
pub(crate) fn validate_apps(errors: &mut Vec<String>, config: &AppShareConfig) {
    let apps = &config.apps;

    for name in &apps.allowed {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            errors.push("apps.allowed contains an empty entry".into());
        } else if trimmed.contains('/') || trimmed.contains(char::is_whitespace) {
            errors.push(format!(
                "apps.allowed entry '{trimmed}' must be a bare program name"
            ));
        }
    }

    validate_range(
        errors,
        "apps.max_concurrent",
        apps.max_concurrent as u64,
        1,
        64,
    );
    validate_range(
        errors,
        "apps.launch_timeout_ms",
        apps.launch_timeout_ms,
        500,
        120_000,
    );
    validate_range(errors, "apps.stop_grace_ms", apps.stop_grace_ms, 100, 60_000);

    if apps.display.trim().is_empty() {
        errors.push("apps.display must not be empty".into());
    }
}
