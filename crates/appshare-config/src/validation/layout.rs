//! Layout validation.

use crate::schema::AppShareConfig;

use super::helpers::{validate_range, validate_range_f64};

/// Validate gaps, cascade parameters and retry bounds.
pub(crate) fn validate_layout(errors: &mut Vec<String>, config: &AppShareConfig) {
    let layout = &config.layout;
    validate_range(errors, "layout.gap", layout.gap as u64, 0, 100);
    validate_range(errors, "layout.outer_margin", layout.outer_margin as u64, 0, 200);
    validate_range(errors, "layout.cascade_step", layout.cascade_step as u64, 1, 200);
    validate_range_f64(
        errors,
        "layout.cascade_scale",
        layout.cascade_scale,
        0.2,
        1.0,
    );
    validate_range(errors, "layout.max_attempts", layout.max_attempts as u64, 1, 10);
}
