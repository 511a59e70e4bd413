use appshare_common::{InstanceId, InstanceState, UserId, WindowId};
use appshare_config::{AppShareConfig, AppsConfig, HealthConfig, RestartConfig};
use appshare_display::{LaunchSpec, ProcessHandle};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;

/// The slice of configuration the process manager reads.
#[derive(Debug, Clone, Default)]
pub struct ProcessSettings {
    pub apps: AppsConfig,
    pub health: HealthConfig,
    pub restart: RestartConfig,
}

impl ProcessSettings {
    pub fn from_config(config: &AppShareConfig) -> Self {
        Self {
            apps: config.apps.clone(),
            health: config.health.clone(),
            restart: config.restart.clone(),
        }
    }
}

/// Point-in-time view of one instance.
#[derive(Debug, Clone, Serialize)]
pub struct InstanceSnapshot {
    pub id: InstanceId,
    pub app: String,
    pub owner: UserId,
    pub state: InstanceState,
    pub pid: Option<u32>,
    pub window: Option<WindowId>,
    pub restart_count: u32,
    pub started_at: DateTime<Utc>,
}

pub(crate) struct Runtime {
    pub handle: Option<ProcessHandle>,
    pub window: Option<WindowId>,
    pub restart_count: u32,
    /// Crash times inside the restart window, oldest first.
    pub crashes: VecDeque<Instant>,
}

pub(crate) struct InstanceEntry {
    pub id: InstanceId,
    pub app: String,
    pub owner: UserId,
    pub started_at: DateTime<Utc>,
    pub spec: LaunchSpec,
    pub runtime: Mutex<Runtime>,
    pub cancel: CancellationToken,
    state: watch::Sender<InstanceState>,
    terminal: AtomicBool,
    stopping: AtomicBool,
}

impl InstanceEntry {
    pub fn new(app: &str, owner: UserId, spec: LaunchSpec) -> Self {
        let (state, _) = watch::channel(InstanceState::Starting);
        Self {
            id: InstanceId::new(),
            app: app.to_string(),
            owner,
            started_at: Utc::now(),
            spec,
            runtime: Mutex::new(Runtime {
                handle: None,
                window: None,
                restart_count: 0,
                crashes: VecDeque::new(),
            }),
            cancel: CancellationToken::new(),
            state,
            terminal: AtomicBool::new(false),
            stopping: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> InstanceState {
        *self.state.borrow()
    }

    pub fn watch(&self) -> watch::Receiver<InstanceState> {
        self.state.subscribe()
    }

    /// Set the state if the current one is in `from` (any state when
    /// `from` is empty). Returns whether the state changed.
    pub fn advance(&self, from: &[InstanceState], to: InstanceState) -> bool {
        self.state.send_if_modified(|current| {
            if *current == to || (!from.is_empty() && !from.contains(current)) {
                return false;
            }
            *current = to;
            true
        })
    }

    /// Crashed with no restarts left. Set before the final state is sent so
    /// watchers that see `Crashed` can tell it apart from a transient crash.
    pub fn mark_terminal(&self) {
        self.terminal.store(true, Ordering::SeqCst);
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal.load(Ordering::SeqCst)
    }

    /// Claim the right to stop this instance. Only the first caller wins.
    pub fn begin_stop(&self) -> bool {
        !self.stopping.swap(true, Ordering::SeqCst)
    }

    pub async fn snapshot(&self) -> InstanceSnapshot {
        let runtime = self.runtime.lock().await;
        InstanceSnapshot {
            id: self.id.clone(),
            app: self.app.clone(),
            owner: self.owner.clone(),
            state: self.state(),
            pid: runtime.handle.map(|h| h.pid),
            window: runtime.window,
            restart_count: runtime.restart_count,
            started_at: self.started_at,
        }
    }
}
