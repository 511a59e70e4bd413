//! Capture and broadcast configuration types.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Frame capture, encoding and fan-out settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Default frames per second for new channels (valid range: 1-60).
    pub frame_rate: u32,
    /// Default JPEG quality for new channels (valid range: 1-100).
    pub quality: u8,
    /// Frames wider than this are downscaled before encoding (valid range: 320-7680).
    pub max_width: u32,
    /// Per-subscriber outbound queue depth (valid range: 1-256).
    pub queue_depth: usize,
    /// Milliseconds a transport may block sending one frame (valid range: 10-30000).
    pub send_timeout_ms: u64,
    /// Consecutive overflowing ticks before a subscriber is dropped as slow (valid range: 1-10000).
    pub max_consecutive_drops: u32,
    /// Capture/encode failures inside the window that mark a channel degraded.
    pub failure_threshold: usize,
    /// Failure window in seconds.
    pub failure_window_secs: u64,
}

impl CaptureConfig {
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    pub fn failure_window(&self) -> Duration {
        Duration::from_secs(self.failure_window_secs)
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            frame_rate: 30,
            quality: 80,
            max_width: 1920,
            queue_depth: 4,
            send_timeout_ms: 2_000,
            max_consecutive_drops: 150,
            failure_threshold: 10,
            failure_window_secs: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_defaults_match_streamer() {
        let config = CaptureConfig::default();
        assert_eq!(config.frame_rate, 30);
        assert_eq!(config.quality, 80);
        assert_eq!(config.max_width, 1920);
        assert_eq!(config.send_timeout(), Duration::from_secs(2));
    }

    #[test]
    fn capture_partial_toml() {
        let toml_str = r#"
frame_rate = 10
queue_depth = 8
"#;
        let config: CaptureConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.frame_rate, 10);
        assert_eq!(config.queue_depth, 8);
        assert_eq!(config.quality, 80);
    }
}
