//! Real child processes on the local machine.

mod env;
mod procfs;

use appshare_common::DisplayError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::process::{LaunchSpec, ProbeReport, ProcessHandle, ProcessHost};
use crate::Result;

pub use env::{sanitized_env, ALLOWED_ENV_VARS};

struct Tracked {
    child: Child,
    last_cpu: Option<(Instant, u64)>,
}

/// Spawns whitelisted programs with a sanitized environment and samples
/// them through `/proc`.
#[derive(Default)]
pub struct NativeProcessHost {
    children: Mutex<HashMap<u32, Tracked>>,
}

impl NativeProcessHost {
    pub fn new() -> Self {
        Self::default()
    }

    fn signal(pid: u32, signal: libc::c_int) -> Result<()> {
        let pid = libc::pid_t::try_from(pid).map_err(|_| DisplayError::ProcessNotFound(pid))?;
        // SAFETY: kill(2) has no memory-safety preconditions.
        let rc = unsafe { libc::kill(pid, signal) };
        if rc == 0 {
            return Ok(());
        }
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::ESRCH) {
            Err(DisplayError::ProcessNotFound(pid as u32))
        } else {
            Err(DisplayError::Io(err))
        }
    }
}

/// Resolve `program` on `PATH`, accepting only executable regular files.
pub fn find_on_path(program: &str, path_var: Option<&str>) -> Option<PathBuf> {
    if program.is_empty() || program.contains('/') {
        return None;
    }
    let path_var = path_var?;
    std::env::split_paths(path_var)
        .map(|dir| dir.join(program))
        .find(|candidate| is_executable(candidate))
}

fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[async_trait]
impl ProcessHost for NativeProcessHost {
    async fn spawn(&self, spec: &LaunchSpec) -> Result<ProcessHandle> {
        let path_var = std::env::var("PATH").ok();
        let program = find_on_path(&spec.program, path_var.as_deref())
            .ok_or_else(|| DisplayError::SpawnFailed(format!("{} not found on PATH", spec.program)))?;

        let mut cmd = Command::new(&program);
        cmd.args(&spec.args)
            .env_clear()
            .envs(sanitized_env(|k| std::env::var(k).ok()))
            .env("DISPLAY", &spec.display)
            .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        if let Some(dir) = &spec.working_dir {
            cmd.current_dir(dir);
        }

        let child = cmd
            .spawn()
            .map_err(|e| DisplayError::SpawnFailed(format!("{}: {e}", program.display())))?;
        let pid = child
            .id()
            .ok_or_else(|| DisplayError::SpawnFailed(format!("{} exited immediately", spec.program)))?;

        info!(pid, program = %program.display(), display = %spec.display, "spawned application");
        self.children.lock().await.insert(
            pid,
            Tracked {
                child,
                last_cpu: None,
            },
        );
        Ok(ProcessHandle { pid })
    }

    async fn probe(&self, handle: ProcessHandle) -> Result<ProbeReport> {
        let mut children = self.children.lock().await;
        let Some(tracked) = children.get_mut(&handle.pid) else {
            return Ok(ProbeReport::dead());
        };

        if let Some(status) = tracked.child.try_wait()? {
            debug!(pid = handle.pid, %status, "process exited");
            children.remove(&handle.pid);
            return Ok(ProbeReport::dead());
        }

        let memory_bytes = procfs::resident_bytes(handle.pid).await?;
        let ticks = procfs::cpu_ticks(handle.pid).await?;
        let now = Instant::now();
        let cpu_percent = match tracked.last_cpu {
            Some((then, prev)) => procfs::cpu_percent(prev, ticks, now.duration_since(then)),
            None => 0.0,
        };
        tracked.last_cpu = Some((now, ticks));

        Ok(ProbeReport {
            alive: true,
            memory_bytes,
            cpu_percent,
        })
    }

    /// Only children this host still tracks are signalled. An untracked pid
    /// has already been reaped and may belong to someone else by now.
    async fn terminate(&self, handle: ProcessHandle) -> Result<()> {
        let mut children = self.children.lock().await;
        let Some(tracked) = children.get_mut(&handle.pid) else {
            debug!(pid = handle.pid, "terminate: process already gone");
            return Ok(());
        };
        if tracked.child.try_wait()?.is_some() {
            children.remove(&handle.pid);
            return Ok(());
        }
        match Self::signal(handle.pid, libc::SIGTERM) {
            Err(DisplayError::ProcessNotFound(_)) => Ok(()),
            other => other,
        }
    }

    async fn kill(&self, handle: ProcessHandle) -> Result<()> {
        let Some(mut tracked) = self.children.lock().await.remove(&handle.pid) else {
            debug!(pid = handle.pid, "kill: process already gone");
            return Ok(());
        };
        if let Err(e) = tracked.child.kill().await {
            warn!(pid = handle.pid, "kill failed: {e}");
            return Err(DisplayError::Io(e));
        }
        Ok(())
    }

    async fn is_available(&self, program: &str) -> bool {
        find_on_path(program, std::env::var("PATH").ok().as_deref()).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn find_on_path_rejects_paths_and_missing() {
        assert!(find_on_path("/bin/sh", Some("/bin")).is_none());
        assert!(find_on_path("", Some("/bin")).is_none());
        assert!(find_on_path("sh", None).is_none());
    }

    #[test]
    fn find_on_path_requires_exec_bit() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fakeapp");
        std::fs::write(&script, "#!/bin/sh\n").unwrap();
        let path_var = dir.path().to_string_lossy().to_string();

        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o644)).unwrap();
        assert!(find_on_path("fakeapp", Some(&path_var)).is_none());

        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        assert_eq!(find_on_path("fakeapp", Some(&path_var)), Some(script));
    }

    #[tokio::test]
    async fn spawn_probe_terminate_lifecycle() {
        let host = NativeProcessHost::new();
        if !host.is_available("sleep").await {
            return;
        }
        let mut spec = LaunchSpec::new("sleep", ":0");
        spec.args = vec!["30".into()];

        let handle = host.spawn(&spec).await.unwrap();
        let report = host.probe(handle).await.unwrap();
        assert!(report.alive);

        host.terminate(handle).await.unwrap();
        let mut alive = true;
        for _ in 0..50 {
            if !host.probe(handle).await.unwrap().alive {
                alive = false;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(!alive);
    }

    #[tokio::test]
    async fn processes_it_did_not_spawn_are_left_alone() {
        let host = NativeProcessHost::new();
        if !host.is_available("sleep").await {
            return;
        }
        let mut foreign = Command::new("sleep").arg("30").spawn().unwrap();
        let handle = ProcessHandle {
            pid: foreign.id().unwrap(),
        };

        host.kill(handle).await.unwrap();
        host.terminate(handle).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(foreign.try_wait().unwrap().is_none());
        foreign.kill().await.unwrap();
    }

    #[tokio::test]
    async fn kill_after_exit_was_observed_is_ok() {
        let host = NativeProcessHost::new();
        if !host.is_available("true").await {
            return;
        }
        let handle = host.spawn(&LaunchSpec::new("true", ":0")).await.unwrap();
        let mut exited = false;
        for _ in 0..50 {
            if !host.probe(handle).await.unwrap().alive {
                exited = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(exited);
        assert!(host.kill(handle).await.is_ok());
        assert!(host.terminate(handle).await.is_ok());
    }

    #[tokio::test]
    async fn kill_unknown_pid_is_ok() {
        let host = NativeProcessHost::new();
        // Above PID_MAX_LIMIT, so never a live process.
        let handle = ProcessHandle { pid: 2_000_000_000 };
        assert!(host.kill(handle).await.is_ok());
        assert!(host.terminate(handle).await.is_ok());
    }
}
