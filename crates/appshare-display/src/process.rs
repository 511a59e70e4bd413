//! The process host capability: launch, probe and signal applications.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::Result;

/// Everything needed to (re)spawn one application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchSpec {
    /// Whitelisted program name, resolved on `PATH`.
    pub program: String,
    pub args: Vec<String>,
    /// X display the app attaches to.
    pub display: String,
    /// Extra variables set on top of the sanitized environment.
    pub env: Vec<(String, String)>,
    pub working_dir: Option<PathBuf>,
}

impl LaunchSpec {
    pub fn new(program: impl Into<String>, display: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            display: display.into(),
            env: Vec::new(),
            working_dir: None,
        }
    }
}

/// Opaque reference to a spawned process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProcessHandle {
    pub pid: u32,
}

/// One liveness/resource sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct ProbeReport {
    pub alive: bool,
    /// Resident set size in bytes.
    pub memory_bytes: u64,
    /// CPU use since the previous probe, in percent of one core.
    pub cpu_percent: f64,
}

impl ProbeReport {
    pub fn dead() -> Self {
        Self::default()
    }

    pub fn memory_mb(&self) -> u64 {
        self.memory_bytes / (1024 * 1024)
    }
}

#[async_trait]
pub trait ProcessHost: Send + Sync {
    async fn spawn(&self, spec: &LaunchSpec) -> Result<ProcessHandle>;

    /// Sample the process. An `Err` is a transient probe failure, not death.
    async fn probe(&self, handle: ProcessHandle) -> Result<ProbeReport>;

    /// Ask the process to exit (SIGTERM).
    async fn terminate(&self, handle: ProcessHandle) -> Result<()>;

    /// Force the process to exit (SIGKILL) and reap it.
    async fn kill(&self, handle: ProcessHandle) -> Result<()>;

    /// Whether `program` can be launched on this host.
    async fn is_available(&self, program: &str) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_mb_rounds_down() {
        let report = ProbeReport {
            alive: true,
            memory_bytes: 3 * 1024 * 1024 + 10,
            cpu_percent: 0.0,
        };
        assert_eq!(report.memory_mb(), 3);
        assert!(!ProbeReport::dead().alive);
    }
}
