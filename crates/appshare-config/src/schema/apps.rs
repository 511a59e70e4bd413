//! Application whitelist and launch configuration types.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Which applications may be launched and how many may run at once.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppsConfig {
    /// Whitelisted application names (resolved on `PATH`).
    pub allowed: Vec<String>,
    /// Global cap on non-terminal instances (valid range: 1-64).
    pub max_concurrent: u32,
    /// X display the applications are attached to.
    pub display: String,
    /// Milliseconds to wait for a launched app to reach Running (valid range: 500-120000).
    pub launch_timeout_ms: u64,
    /// Milliseconds between SIGTERM and a forced kill on stop (valid range: 100-60000).
    pub stop_grace_ms: u64,
    /// Require a mapped window before an instance counts as Running.
    pub require_window: bool,
    /// Working directory for launched apps; empty means the home directory.
    pub working_dir: String,
}

impl AppsConfig {
    pub fn launch_timeout(&self) -> Duration {
        Duration::from_millis(self.launch_timeout_ms)
    }

    pub fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stop_grace_ms)
    }

    pub fn is_allowed(&self, name: &str) -> bool {
        self.allowed.iter().any(|a| a.trim() == name)
    }
}

impl Default for AppsConfig {
    fn default() -> Self {
        Self {
            allowed: ["firefox", "code", "cursor", "gedit", "libreoffice"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            max_concurrent: 10,
            display: ":0".into(),
            launch_timeout_ms: 15_000,
            stop_grace_ms: 5_000,
            require_window: true,
            working_dir: String::new(),
        }
    }
}
