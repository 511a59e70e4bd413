//! Per-instance supervision loop.

use appshare_common::{EngineEvent, InstanceState};
use appshare_config::HealthConfig;
use appshare_display::{ProbeReport, ProcessHandle};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::{InstanceEntry, ProcessManager, ProcessSettings};

/// Readiness is polled at least this often while starting.
const READY_POLL: Duration = Duration::from_millis(100);

enum CrashOutcome {
    Restarted,
    Terminal,
    Cancelled,
}

pub(super) async fn run(manager: ProcessManager, entry: Arc<InstanceEntry>) {
    let mut failures = 0u32;
    let mut ready_deadline: Option<Instant> = None;

    loop {
        let settings = manager.settings().await;
        let starting = matches!(
            entry.state(),
            InstanceState::Starting | InstanceState::Restarting
        );
        let period = if starting {
            settings.health.interval().min(READY_POLL)
        } else {
            settings.health.interval()
        };

        tokio::select! {
            _ = entry.cancel.cancelled() => break,
            _ = tokio::time::sleep(period) => {}
        }

        let Some(handle) = entry.runtime.lock().await.handle else {
            continue;
        };
        let report = match manager.host().probe(handle).await {
            Ok(report) => report,
            Err(e) => {
                debug!(instance_id = %entry.id, error = %e, "probe failed");
                ProbeReport::dead()
            }
        };
        if entry.cancel.is_cancelled() {
            break;
        }

        if !report.alive {
            failures += 1;
            if failures < settings.health.failure_threshold.max(1) {
                continue;
            }
            failures = 0;
            match handle_crash(&manager, &entry, &settings).await {
                CrashOutcome::Restarted => {
                    ready_deadline = Some(Instant::now() + settings.apps.launch_timeout());
                    continue;
                }
                CrashOutcome::Terminal | CrashOutcome::Cancelled => break,
            }
        }
        failures = 0;

        match entry.state() {
            InstanceState::Starting | InstanceState::Restarting => {
                if check_ready(&manager, &entry, handle, &settings).await {
                    ready_deadline = None;
                } else if ready_deadline.is_some_and(|d| Instant::now() >= d) {
                    warn!(instance_id = %entry.id, app = %entry.app, "restarted instance never became ready");
                    match handle_crash(&manager, &entry, &settings).await {
                        CrashOutcome::Restarted => {
                            ready_deadline =
                                Some(Instant::now() + settings.apps.launch_timeout());
                        }
                        CrashOutcome::Terminal | CrashOutcome::Cancelled => break,
                    }
                }
            }
            InstanceState::Running => {
                if let Some(detail) = resource_breach(&report, &settings.health) {
                    warn!(instance_id = %entry.id, app = %entry.app, %detail, "resource limit exceeded");
                    manager.events().publish(EngineEvent::InstanceResourceExceeded {
                        instance_id: entry.id.clone(),
                        detail,
                    });
                    if entry.begin_stop() {
                        manager.shutdown(&entry, settings.apps.stop_grace()).await;
                    }
                    break;
                }
            }
            _ => {}
        }
    }
    debug!(instance_id = %entry.id, "supervisor exited");
}

/// Alive, plus a mapped window owned by the process when one is required.
async fn check_ready(
    manager: &ProcessManager,
    entry: &InstanceEntry,
    handle: ProcessHandle,
    settings: &ProcessSettings,
) -> bool {
    let window = if settings.apps.require_window {
        let windows = match manager.display().query_windows().await {
            Ok(windows) => windows,
            Err(e) => {
                debug!(instance_id = %entry.id, error = %e, "window query failed");
                return false;
            }
        };
        match windows
            .iter()
            .filter(|w| w.pid == Some(handle.pid))
            .min_by_key(|w| w.created)
        {
            Some(w) => Some(w.id),
            None => return false,
        }
    } else {
        None
    };

    let mut runtime = entry.runtime.lock().await;
    if entry.cancel.is_cancelled() {
        return false;
    }
    runtime.window = window;
    drop(runtime);

    let ready = manager.transition(
        entry,
        &[InstanceState::Starting, InstanceState::Restarting],
        InstanceState::Running,
    );
    if ready {
        info!(instance_id = %entry.id, pid = handle.pid, window = ?window, "instance ready");
    }
    ready
}

/// Restart when fewer than `max_restarts` crashes fall inside the window,
/// otherwise the instance is terminally crashed and leaves the table.
async fn handle_crash(
    manager: &ProcessManager,
    entry: &Arc<InstanceEntry>,
    settings: &ProcessSettings,
) -> CrashOutcome {
    let mut runtime = entry.runtime.lock().await;
    if entry.cancel.is_cancelled() {
        return CrashOutcome::Cancelled;
    }

    let now = std::time::Instant::now();
    let window = settings.restart.window();
    while runtime
        .crashes
        .front()
        .is_some_and(|t| now.duration_since(*t) > window)
    {
        runtime.crashes.pop_front();
    }
    let recent = runtime.crashes.len() as u32;
    runtime.crashes.push_back(now);

    if let Some(old) = runtime.handle.take() {
        if let Err(e) = manager.host().kill(old).await {
            warn!(instance_id = %entry.id, pid = old.pid, error = %e, "failed to reap crashed process");
        }
    }
    runtime.window = None;

    let restart = settings.restart.enabled && recent < settings.restart.max_restarts;
    if restart {
        runtime.restart_count += 1;
        let restart_count = runtime.restart_count;
        manager.transition(entry, &[], InstanceState::Crashed);
        publish_crash(manager, entry, restart_count, false);
        warn!(
            instance_id = %entry.id,
            app = %entry.app,
            restart_count,
            recent_crashes = recent + 1,
            "instance crashed, restarting"
        );
        manager.transition(entry, &[], InstanceState::Restarting);

        match manager.host().spawn(&entry.spec).await {
            Ok(handle) => {
                runtime.handle = Some(handle);
                debug!(instance_id = %entry.id, pid = handle.pid, "process respawned");
                return CrashOutcome::Restarted;
            }
            Err(e) => {
                error!(instance_id = %entry.id, app = %entry.app, error = %e, "respawn failed");
            }
        }
    } else {
        warn!(
            instance_id = %entry.id,
            app = %entry.app,
            recent_crashes = recent + 1,
            "instance crashed, restart budget exhausted"
        );
    }

    let restart_count = runtime.restart_count;
    drop(runtime);
    entry.mark_terminal();
    entry.cancel.cancel();
    manager.finish(entry, InstanceState::Crashed).await;
    publish_crash(manager, entry, restart_count, true);
    CrashOutcome::Terminal
}

fn publish_crash(
    manager: &ProcessManager,
    entry: &InstanceEntry,
    restart_count: u32,
    terminal: bool,
) {
    manager.events().publish(EngineEvent::InstanceCrashed {
        instance_id: entry.id.clone(),
        app: entry.app.clone(),
        restart_count,
        terminal,
    });
}

pub(super) fn resource_breach(report: &ProbeReport, health: &HealthConfig) -> Option<String> {
    if health.max_memory_mb > 0 && report.memory_mb() > health.max_memory_mb {
        return Some(format!(
            "memory {} MB exceeds {} MB",
            report.memory_mb(),
            health.max_memory_mb
        ));
    }
    if health.max_cpu_percent > 0.0 && report.cpu_percent > health.max_cpu_percent {
        return Some(format!(
            "cpu {:.1}% exceeds {:.1}%",
            report.cpu_percent, health.max_cpu_percent
        ));
    }
    None
}
