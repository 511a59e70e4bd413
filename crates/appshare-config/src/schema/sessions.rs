//! Collaborative session defaults.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Defaults applied to newly created sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionsConfig {
    /// Default participant cap (valid range: 1-100).
    pub max_participants: usize,
    pub allow_guests: bool,
    /// Idle seconds before a session is reaped; 0 disables reaping.
    pub idle_timeout_secs: u64,
}

impl SessionsConfig {
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
    }
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            max_participants: 10,
            allow_guests: true,
            idle_timeout_secs: 3_600,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sessions_defaults() {
        let config = SessionsConfig::default();
        assert_eq!(config.max_participants, 10);
        assert!(config.allow_guests);
        assert_eq!(config.idle_timeout(), Some(Duration::from_secs(3_600)));
    }

    #[test]
    fn zero_idle_timeout_disables_reaping() {
        let config: SessionsConfig = toml::from_str("idle_timeout_secs = 0").unwrap();
        assert_eq!(config.idle_timeout(), None);
    }
}
