//! System configuration types: WebSocket server and logging.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// WebSocket transport settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    /// Listen port (valid range: 1024-65535).
    pub port: u32,
    /// Seconds a client has to send its hello (valid range: 1-120).
    pub hello_timeout_secs: u64,
    /// Maximum simultaneous client connections (valid range: 1-10000).
    pub max_connections: u32,
}

impl ServerConfig {
    pub fn hello_timeout(&self) -> Duration {
        Duration::from_secs(self.hello_timeout_secs)
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".into(),
            port: 8765,
            hello_timeout_secs: 10,
            max_connections: 256,
        }
    }
}

/// Log level.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    /// Extra `EnvFilter` directives appended after the level, e.g. `"tokio_tungstenite=warn"`.
    pub directives: Vec<String>,
}

impl LoggingConfig {
    /// Build the filter string used when `RUST_LOG` is not set.
    pub fn filter_directive(&self) -> String {
        let mut parts = vec![format!("appshare={}", self.level.as_str())];
        parts.extend(self.directives.iter().cloned());
        parts.join(",")
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            directives: Vec::new(),
        }
    }
}
