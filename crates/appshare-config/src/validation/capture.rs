//! Capture and broadcast validation.

use crate::schema::AppShareConfig;

use super::helpers::validate_range;

/// Validate capture rates, encoder settings and subscriber backpressure.
pub(crate) fn validate_capture(errors: &mut Vec<String>, config: &AppShareConfig) {
    let capture = &config.capture;
    validate_range(errors, "capture.frame_rate", capture.frame_rate as u64, 1, 60);
    validate_range(errors, "capture.quality", capture.quality as u64, 1, 100);
    validate_range(errors, "capture.max_width", capture.max_width as u64, 320, 7_680);
    validate_range(errors, "capture.queue_depth", capture.queue_depth as u64, 1, 256);
    validate_range(
        errors,
        "capture.send_timeout_ms",
        capture.send_timeout_ms,
        10,
        30_000,
    );
    validate_range(
        errors,
        "capture.max_consecutive_drops",
        capture.max_consecutive_drops as u64,
        1,
        10_000,
    );
    validate_range(
        errors,
        "capture.failure_threshold",
        capture.failure_threshold as u64,
        1,
        1_000,
    );
    validate_range(
        errors,
        "capture.failure_window_secs",
        capture.failure_window_secs,
        1,
        3_600,
    );
}
