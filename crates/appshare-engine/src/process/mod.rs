//! Application lifecycle: launch, supervise, restart and stop.
//!
//! Every instance lives in one table entry holding its launch spec, its
//! runtime state and a `watch` channel other components follow (capture
//! channels tear down when it leaves `Running`). A supervisor task per
//! instance drives readiness, health probes and restarts.

mod supervisor;
mod types;


pub use types::{InstanceSnapshot, ProcessSettings};

pub(crate) use types::InstanceEntry;

use appshare_common::{
    EngineEvent, EventBus, InstanceId, InstanceState, UserId, WindowId, WindowInfo,
};
use appshare_display::{DisplayAdapter, LaunchSpec, ProcessHandle, ProcessHost};
use futures_util::future::join_all;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::auth::Authorizer;
use crate::error::{EngineError, Result};

/// Poll period while waiting for a terminated process to exit.
const STOP_POLL: Duration = Duration::from_millis(50);

struct Inner {
    settings: RwLock<ProcessSettings>,
    host: Arc<dyn ProcessHost>,
    display: Arc<dyn DisplayAdapter>,
    authorizer: Arc<dyn Authorizer>,
    events: EventBus,
    instances: RwLock<HashMap<InstanceId, Arc<InstanceEntry>>>,
}

/// Owns every supervised instance. Cheap to clone.
#[derive(Clone)]
pub struct ProcessManager {
    inner: Arc<Inner>,
}

impl ProcessManager {
    pub fn new(
        settings: ProcessSettings,
        host: Arc<dyn ProcessHost>,
        display: Arc<dyn DisplayAdapter>,
        authorizer: Arc<dyn Authorizer>,
        events: EventBus,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                settings: RwLock::new(settings),
                host,
                display,
                authorizer,
                events,
                instances: RwLock::new(HashMap::new()),
            }),
        }
    }

    pub async fn settings(&self) -> ProcessSettings {
        self.inner.settings.read().await.clone()
    }

    /// Later launches and probe cycles pick up the new settings. Running
    /// instances above a lowered concurrency limit are left alone.
    pub async fn update_settings(&self, settings: ProcessSettings) {
        *self.inner.settings.write().await = settings;
    }

    /// Launch a whitelisted application and wait until it is ready.
    pub async fn start(&self, app: &str, user: &UserId) -> Result<InstanceSnapshot> {
        let settings = self.settings().await;
        let app = app.trim();
        if !settings.apps.is_allowed(app) {
            warn!(app, user = %user, "launch rejected: not whitelisted");
            return Err(EngineError::NotAllowed(format!(
                "{app} is not an allowed application"
            )));
        }
        if !self.inner.authorizer.can_launch(user, app) {
            warn!(app, user = %user, "launch rejected by authorizer");
            return Err(EngineError::NotAllowed(format!("{user} may not launch {app}")));
        }

        let mut spec = LaunchSpec::new(app, settings.apps.display.clone());
        if !settings.apps.working_dir.is_empty() {
            spec.working_dir = Some(PathBuf::from(&settings.apps.working_dir));
        }
        let entry = Arc::new(InstanceEntry::new(app, user.clone(), spec));

        {
            let mut table = self.inner.instances.write().await;
            let limit = settings.apps.max_concurrent as usize;
            if table.len() >= limit {
                warn!(app, user = %user, limit, "launch rejected: at capacity");
                return Err(EngineError::AtCapacity { limit });
            }
            table.insert(entry.id.clone(), entry.clone());
        }
        info!(instance_id = %entry.id, app, user = %user, "starting instance");
        self.publish_state(&entry, InstanceState::Starting);

        let handle = match self.inner.host.spawn(&entry.spec).await {
            Ok(handle) => handle,
            Err(e) => {
                warn!(instance_id = %entry.id, app, error = %e, "spawn failed");
                entry.cancel.cancel();
                self.finish(&entry, InstanceState::Stopped).await;
                return Err(e.into());
            }
        };
        entry.runtime.lock().await.handle = Some(handle);
        debug!(instance_id = %entry.id, pid = handle.pid, "process spawned");

        tokio::spawn(supervisor::run(self.clone(), entry.clone()));

        let timeout = settings.apps.launch_timeout();
        let mut rx = entry.watch();
        let watched = entry.clone();
        let outcome = tokio::time::timeout(timeout, async move {
            rx.wait_for(|state| match state {
                InstanceState::Starting | InstanceState::Restarting => false,
                InstanceState::Crashed => watched.is_terminal(),
                _ => true,
            })
            .await
            .map(|state| *state)
        })
        .await;

        match outcome {
            Ok(Ok(InstanceState::Running)) => {
                info!(instance_id = %entry.id, app, "instance running");
                Ok(entry.snapshot().await)
            }
            Ok(Ok(InstanceState::Crashed)) | Ok(Err(_)) => {
                Err(EngineError::ProcessCrashed(format!("{app} ({})", entry.id)))
            }
            Ok(Ok(_)) => Err(EngineError::not_found("instance", &entry.id)),
            Err(_) => {
                warn!(instance_id = %entry.id, app, ?timeout, "launch timed out");
                if entry.begin_stop() {
                    self.shutdown(&entry, Duration::ZERO).await;
                }
                Err(EngineError::LaunchTimeout {
                    app: app.to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        }
    }

    /// Stop on behalf of `user`, who must own the instance or be allowed
    /// to control it.
    pub async fn stop_as(&self, id: &InstanceId, user: &UserId) -> Result<InstanceSnapshot> {
        let snapshot = self
            .snapshot(id)
            .await
            .ok_or_else(|| EngineError::not_found("instance", id))?;
        if snapshot.owner != *user && !self.inner.authorizer.can_control(user, &snapshot) {
            return Err(EngineError::NotAllowed(format!("{user} may not stop {id}")));
        }
        self.stop(id).await
    }

    /// Graceful stop: terminate, wait out the grace period, then kill.
    pub async fn stop(&self, id: &InstanceId) -> Result<InstanceSnapshot> {
        let entry = self
            .entry(id)
            .await
            .ok_or_else(|| EngineError::not_found("instance", id))?;
        let grace = self.settings().await.apps.stop_grace();

        if entry.begin_stop() {
            self.shutdown(&entry, grace).await;
        } else {
            let mut rx = entry.watch();
            let _ = tokio::time::timeout(grace + STOP_POLL * 4, async move {
                let _ = rx.wait_for(|s| s.is_stopped()).await;
            })
            .await;
        }
        Ok(entry.snapshot().await)
    }

    /// Stop every instance concurrently. Used at shutdown.
    pub async fn stop_all(&self) {
        let ids: Vec<InstanceId> = self.inner.instances.read().await.keys().cloned().collect();
        let stops = ids.iter().map(|id| self.stop(id));
        for result in join_all(stops).await {
            if let Err(e) = result {
                debug!(error = %e, "stop during shutdown");
            }
        }
    }

    pub async fn list(&self) -> Vec<InstanceSnapshot> {
        let entries: Vec<Arc<InstanceEntry>> =
            self.inner.instances.read().await.values().cloned().collect();
        let mut out = Vec::with_capacity(entries.len());
        for entry in entries {
            out.push(entry.snapshot().await);
        }
        out.sort_by(|a, b| a.started_at.cmp(&b.started_at));
        out
    }

    pub async fn snapshot(&self, id: &InstanceId) -> Option<InstanceSnapshot> {
        match self.entry(id).await {
            Some(entry) => Some(entry.snapshot().await),
            None => None,
        }
    }

    /// Follow an instance's state. `None` once it has left the table.
    pub async fn watch(&self, id: &InstanceId) -> Option<watch::Receiver<InstanceState>> {
        self.entry(id).await.map(|e| e.watch())
    }

    /// The instance's main window, if it has mapped one.
    pub async fn window_of(&self, id: &InstanceId) -> Option<(WindowId, Option<u32>)> {
        let entry = self.entry(id).await?;
        let runtime = entry.runtime.lock().await;
        runtime
            .window
            .map(|w| (w, runtime.handle.map(|h| h.pid)))
    }

    /// Fill in `instance_id` on windows owned by a supervised process.
    pub async fn annotate(&self, windows: &mut [WindowInfo]) {
        let mut by_pid = HashMap::new();
        for entry in self.inner.instances.read().await.values() {
            if let Some(handle) = entry.runtime.lock().await.handle {
                by_pid.insert(handle.pid, entry.id.clone());
            }
        }
        for window in windows.iter_mut() {
            window.instance_id = window.pid.and_then(|pid| by_pid.get(&pid).cloned());
        }
    }

    /// The whitelist filtered to programs the host can actually launch.
    pub async fn available_applications(&self) -> Vec<String> {
        let allowed = self.settings().await.apps.allowed;
        let mut out = Vec::with_capacity(allowed.len());
        for name in allowed {
            let name = name.trim();
            if self.inner.host.is_available(name).await {
                out.push(name.to_string());
            }
        }
        out
    }

    pub(crate) fn host(&self) -> &Arc<dyn ProcessHost> {
        &self.inner.host
    }

    pub(crate) fn display(&self) -> &Arc<dyn DisplayAdapter> {
        &self.inner.display
    }

    pub(crate) fn events(&self) -> &EventBus {
        &self.inner.events
    }

    async fn entry(&self, id: &InstanceId) -> Option<Arc<InstanceEntry>> {
        self.inner.instances.read().await.get(id).cloned()
    }

    /// Move to `to` if the current state is in `from`, publishing the change.
    pub(crate) fn transition(
        &self,
        entry: &InstanceEntry,
        from: &[InstanceState],
        to: InstanceState,
    ) -> bool {
        let changed = entry.advance(from, to);
        if changed {
            self.publish_state(entry, to);
        }
        changed
    }

    fn publish_state(&self, entry: &InstanceEntry, state: InstanceState) {
        debug!(instance_id = %entry.id, %state, "instance state");
        self.inner.events.publish(EngineEvent::InstanceStateChanged {
            instance_id: entry.id.clone(),
            app: entry.app.clone(),
            state,
        });
    }

    /// Stopping -> terminate -> (grace) -> kill -> Stopped -> removed.
    pub(crate) async fn shutdown(&self, entry: &Arc<InstanceEntry>, grace: Duration) {
        entry.cancel.cancel();
        self.transition(entry, &[], InstanceState::Stopping);
        info!(instance_id = %entry.id, app = %entry.app, "stopping instance");

        let handle = entry.runtime.lock().await.handle;
        if let Some(handle) = handle {
            self.terminate_within(handle, grace).await;
        }
        self.finish(entry, InstanceState::Stopped).await;
        info!(instance_id = %entry.id, app = %entry.app, "instance stopped");
    }

    async fn terminate_within(&self, handle: ProcessHandle, grace: Duration) {
        let host = &self.inner.host;
        if !grace.is_zero() {
            if let Err(e) = host.terminate(handle).await {
                warn!(pid = handle.pid, error = %e, "terminate failed");
            }
            let deadline = Instant::now() + grace;
            loop {
                if let Ok(report) = host.probe(handle).await {
                    if !report.alive {
                        return;
                    }
                }
                if Instant::now() >= deadline {
                    break;
                }
                tokio::time::sleep(STOP_POLL).await;
            }
            warn!(pid = handle.pid, ?grace, "process ignored terminate, killing");
        }
        if let Err(e) = host.kill(handle).await {
            warn!(pid = handle.pid, error = %e, "kill failed");
        }
    }

    /// Final state, then drop the entry from the table.
    pub(crate) async fn finish(&self, entry: &Arc<InstanceEntry>, state: InstanceState) {
        self.transition(entry, &[], state);
        let mut table = self.inner.instances.write().await;
        if table
            .get(&entry.id)
            .is_some_and(|current| Arc::ptr_eq(current, entry))
        {
            table.remove(&entry.id);
        }
    }
}
