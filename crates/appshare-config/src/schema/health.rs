//! Health probe and auto-restart configuration types.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Liveness and resource polling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Probe interval in milliseconds (valid range: 10-60000).
    pub interval_ms: u64,
    /// Consecutive failed liveness checks before an instance is Crashed (valid range: 1-20).
    pub failure_threshold: u32,
    /// Resident memory ceiling in MiB; 0 disables the check.
    pub max_memory_mb: u64,
    /// CPU ceiling in percent of one core; 0 disables the check.
    pub max_cpu_percent: f64,
}

impl HealthConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1_000,
            failure_threshold: 3,
            max_memory_mb: 4_096,
            max_cpu_percent: 0.0,
        }
    }
}

/// Auto-restart budget for crashed instances.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RestartConfig {
    pub enabled: bool,
    /// Crashes tolerated inside the window before giving up (valid range: 0-20).
    pub max_restarts: u32,
    /// Sliding window in seconds (valid range: 1-86400).
    pub window_secs: u64,
}

impl RestartConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

impl Default for RestartConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_restarts: 3,
            window_secs: 60,
        }
    }
}
