//! Health probe and restart budget validation.

use crate::schema::AppShareConfig;

use super::helpers::{validate_range, validate_range_f64};

/// Validate probe cadence and resource ceilings.
pub(crate) fn validate_health(errors: &mut Vec<String>, config: &AppShareConfig) {
    let health = &config.health;
    validate_range(errors, "health.interval_ms", health.interval_ms, 10, 60_000);
    validate_range(
        errors,
        "health.failure_threshold",
        health.failure_threshold as u64,
        1,
        20,
    );
    validate_range_f64(
        errors,
        "health.max_cpu_percent",
        health.max_cpu_percent,
        0.0,
        6_400.0,
    );
}

/// Validate the restart budget.
pub(crate) fn validate_restart(errors: &mut Vec<String>, config: &AppShareConfig) {
    validate_range(
        errors,
        "restart.max_restarts",
        config.restart.max_restarts as u64,
        0,
        20,
    );
    validate_range(
        errors,
        "restart.window_secs",
        config.restart.window_secs,
        1,
        86_400,
    );
}
