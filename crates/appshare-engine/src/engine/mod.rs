//! The engine facade the transport talks to.

use appshare_common::{
    ChannelTarget, CloseReason, EngineEvent, EventBus, InstanceId, InstanceState, Rect,
    SessionId, SubscriberId, UserId, WindowId, WindowInfo,
};
use appshare_config::AppShareConfig;
use appshare_display::{DisplayAdapter, ProcessHost};
use appshare_layout::{LayoutKind, Placement, SnapZone};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::auth::Authorizer;
use crate::capture::{CaptureRegistry, CaptureSettings, ChannelInfo, Subscription};
use crate::error::{EngineError, Result};
use crate::input::{InputEvent, InputRouter};
use crate::layout::{LayoutCoordinator, LayoutPreset, PresetConfig, PresetOutcome};
use crate::process::{InstanceSnapshot, ProcessManager, ProcessSettings};
use crate::session::{Session, SessionManager, SessionSettings, SessionStats, SessionSummary};

const EVENT_CAPACITY: usize = 1024;

/// How often idle sessions are looked for.
const REAP_INTERVAL: Duration = Duration::from_secs(30);

pub struct Engine {
    config: RwLock<AppShareConfig>,
    authorizer: Arc<dyn Authorizer>,
    events: EventBus,
    processes: ProcessManager,
    capture: CaptureRegistry,
    sessions: SessionManager,
    input: InputRouter,
    layout: LayoutCoordinator,
    pump: CancellationToken,
}

impl Engine {
    /// Wire every component to `display` and `host`. Fails with
    /// `DisplayUnavailable` if the display cannot even report its size.
    pub async fn new(
        config: AppShareConfig,
        display: Arc<dyn DisplayAdapter>,
        host: Arc<dyn ProcessHost>,
        authorizer: Arc<dyn Authorizer>,
    ) -> Result<Self> {
        let screen = display
            .screen_size()
            .await
            .map_err(|e| EngineError::DisplayUnavailable(e.to_string()))?;
        info!(width = screen.width, height = screen.height, display = %config.apps.display, "display ready");

        let events = EventBus::new(EVENT_CAPACITY);
        let processes = ProcessManager::new(
            ProcessSettings::from_config(&config),
            host,
            display.clone(),
            authorizer.clone(),
            events.clone(),
        );
        let capture = CaptureRegistry::new(
            config.capture.clone(),
            processes.clone(),
            display.clone(),
            events.clone(),
        );
        let sessions = SessionManager::new(
            config.sessions.clone(),
            capture.clone(),
            authorizer.clone(),
            events.clone(),
        );
        let input = InputRouter::new(
            processes.clone(),
            sessions.clone(),
            capture.clone(),
            display.clone(),
            authorizer.clone(),
        );
        let layout = LayoutCoordinator::new(config.layout.clone(), display, events.clone());

        let pump = CancellationToken::new();
        tokio::spawn(run_pump(
            events.subscribe(),
            sessions.clone(),
            capture.clone(),
            pump.clone(),
        ));

        Ok(Self {
            config: RwLock::new(config),
            authorizer,
            events,
            processes,
            capture,
            sessions,
            input,
            layout,
            pump,
        })
    }

    pub fn events(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    pub async fn config(&self) -> AppShareConfig {
        self.config.read().await.clone()
    }

    /// Apply a new configuration to every component. Capture defaults are
    /// pushed to running channels; running instances are not restarted.
    pub async fn reconfigure(&self, config: AppShareConfig) {
        self.processes
            .update_settings(ProcessSettings::from_config(&config))
            .await;
        self.capture.apply_defaults(config.capture.clone()).await;
        self.sessions.apply_defaults(config.sessions.clone()).await;
        self.layout.update_config(config.layout.clone()).await;
        *self.config.write().await = config;
        info!("configuration applied");
    }

    // -- applications -------------------------------------------------------

    pub async fn start(&self, app: &str, user: &UserId) -> Result<InstanceSnapshot> {
        self.processes.start(app, user).await
    }

    pub async fn stop(&self, id: &InstanceId, user: &UserId) -> Result<InstanceSnapshot> {
        let snapshot = self.processes.stop_as(id, user).await?;
        self.capture
            .close_target(&ChannelTarget::Instance(id.clone()), CloseReason::TargetNotRunning)
            .await;
        Ok(snapshot)
    }

    /// Instances, optionally only those owned by `owner`.
    pub async fn list_instances(&self, owner: Option<&UserId>) -> Vec<InstanceSnapshot> {
        let mut all = self.processes.list().await;
        if let Some(owner) = owner {
            all.retain(|s| s.owner == *owner);
        }
        all
    }

    pub async fn status(&self, id: &InstanceId) -> Result<InstanceSnapshot> {
        self.processes
            .snapshot(id)
            .await
            .ok_or_else(|| EngineError::not_found("instance", id))
    }

    pub async fn available_applications(&self) -> Vec<String> {
        self.processes.available_applications().await
    }

    /// Windows on the display, tagged with the instance that owns them.
    pub async fn windows(&self) -> Result<Vec<WindowInfo>> {
        let mut windows = self.processes.display().query_windows().await?;
        self.processes.annotate(&mut windows).await;
        Ok(windows)
    }

    // -- streams ------------------------------------------------------------

    pub async fn subscribe(&self, target: ChannelTarget, user: &UserId) -> Result<Subscription> {
        let allowed = match &target {
            ChannelTarget::Instance(id) => {
                let snapshot = self
                    .processes
                    .snapshot(id)
                    .await
                    .ok_or_else(|| EngineError::not_found("instance", id))?;
                snapshot.owner == *user
                    || self.sessions.is_participant(id, user).await
                    || self.authorizer.can_control(user, &snapshot)
                    || self.authorizer.can_view(user, &target, Some(&snapshot.owner))
            }
            ChannelTarget::LiveView => self.authorizer.can_view(user, &target, None),
        };
        if !allowed {
            warn!(%target, user = %user, "subscribe rejected");
            return Err(EngineError::NotAllowed(format!("{user} may not view {target}")));
        }
        self.capture.subscribe(target).await
    }

    pub async fn unsubscribe(&self, target: &ChannelTarget, subscriber: &SubscriberId) -> bool {
        self.capture.unsubscribe(target, subscriber).await
    }

    pub async fn set_capture_settings(
        &self,
        target: &ChannelTarget,
        settings: CaptureSettings,
    ) -> Result<()> {
        self.capture.update_settings(target, settings).await
    }

    pub async fn channels(&self) -> Vec<ChannelInfo> {
        self.capture.list().await
    }

    // -- layout -------------------------------------------------------------

    pub async fn apply_layout(&self, kind: LayoutKind) -> Result<Vec<Placement>> {
        self.layout.apply(kind).await
    }

    pub async fn snap(&self, window: WindowId, zone: SnapZone) -> Result<Placement> {
        self.layout.snap(window, zone).await
    }

    /// Snap the main window of an instance.
    pub async fn snap_instance(&self, id: &InstanceId, zone: SnapZone) -> Result<Placement> {
        let (window, _) = self
            .processes
            .window_of(id)
            .await
            .ok_or_else(|| EngineError::not_found("window for instance", id))?;
        self.layout.snap(window, zone).await
    }

    pub async fn resize_window(
        &self,
        window: WindowId,
        rect: Rect,
        user: &UserId,
    ) -> Result<Placement> {
        self.check_window_control(window, user).await?;
        self.layout.resize(window, rect).await
    }

    pub async fn maximize_window(&self, window: WindowId, user: &UserId) -> Result<Placement> {
        self.check_window_control(window, user).await?;
        self.layout.maximize(window).await
    }

    pub async fn minimize_window(&self, window: WindowId, user: &UserId) -> Result<()> {
        self.check_window_control(window, user).await?;
        self.layout.minimize(window).await
    }

    pub async fn close_window(&self, window: WindowId, user: &UserId) -> Result<()> {
        self.check_window_control(window, user).await?;
        self.layout.close(window).await
    }

    pub async fn focus_window(&self, window: WindowId, user: &UserId) -> Result<()> {
        self.check_window_control(window, user).await?;
        self.layout.focus(window).await
    }

    pub async fn save_layout_preset(
        &self,
        name: &str,
        config: PresetConfig,
    ) -> Result<LayoutPreset> {
        self.layout.save_preset(name, config).await
    }

    pub async fn layout_presets(&self) -> Vec<LayoutPreset> {
        self.layout.presets().await
    }

    pub async fn apply_layout_preset(&self, name: &str) -> Result<PresetOutcome> {
        self.layout.apply_preset(name).await
    }

    pub async fn delete_layout_preset(&self, name: &str) -> Result<()> {
        self.layout.delete_preset(name).await
    }

    /// Windows of an instance may only be changed by those who could also
    /// send it input. Windows no instance owns are open to everyone.
    async fn check_window_control(&self, window: WindowId, user: &UserId) -> Result<()> {
        let mut windows = self.processes.display().query_windows().await?;
        windows.retain(|w| w.id == window);
        self.processes.annotate(&mut windows).await;
        let Some(instance) = windows.first().and_then(|w| w.instance_id.clone()) else {
            return Ok(());
        };
        let Some(snapshot) = self.processes.snapshot(&instance).await else {
            return Ok(());
        };
        if snapshot.owner == *user
            || self.sessions.is_participant(&instance, user).await
            || self.authorizer.can_control(user, &snapshot)
        {
            return Ok(());
        }
        warn!(%window, instance_id = %instance, user = %user, "window operation rejected");
        Err(EngineError::NotAllowed(format!(
            "{user} may not change windows of {instance}"
        )))
    }

    // -- input --------------------------------------------------------------

    pub async fn submit_input(&self, event: InputEvent) -> Result<()> {
        self.input.submit(event).await
    }

    // -- sessions -----------------------------------------------------------

    /// Share a running instance. Only someone who controls it may share it.
    pub async fn create_session(
        &self,
        owner: &UserId,
        name: &str,
        target: &InstanceId,
        settings: Option<SessionSettings>,
    ) -> Result<Session> {
        let snapshot = self
            .processes
            .snapshot(target)
            .await
            .filter(|s| s.state.is_running())
            .ok_or_else(|| EngineError::not_found("running instance", target))?;
        if snapshot.owner != *owner && !self.authorizer.can_control(owner, &snapshot) {
            return Err(EngineError::NotAllowed(format!(
                "{owner} may not share {target}"
            )));
        }
        self.sessions
            .create(owner, name, target.clone(), settings)
            .await
    }

    pub async fn join_session(
        &self,
        id: &SessionId,
        user: &UserId,
    ) -> Result<(Session, Subscription)> {
        self.sessions.join(id, user).await
    }

    pub async fn leave_session(&self, id: &SessionId, user: &UserId) -> Result<Option<Session>> {
        self.sessions.leave(id, user).await
    }

    pub async fn close_session(&self, id: &SessionId, requester: &UserId) -> Result<()> {
        self.sessions.close(id, requester).await
    }

    pub async fn update_session_settings(
        &self,
        id: &SessionId,
        requester: &UserId,
        settings: SessionSettings,
    ) -> Result<Session> {
        self.sessions.update_settings(id, requester, settings).await
    }

    pub async fn list_sessions(&self, user: &UserId) -> Vec<SessionSummary> {
        self.sessions.list(user).await
    }

    pub async fn session(&self, id: &SessionId) -> Result<Session> {
        self.sessions
            .get(id)
            .await
            .ok_or_else(|| EngineError::not_found("session", id))
    }

    /// The session `user` joined most recently.
    pub async fn user_session(&self, user: &UserId) -> Result<Session> {
        self.sessions
            .user_session(user)
            .await
            .ok_or_else(|| EngineError::not_found("session for user", user))
    }

    pub async fn session_stats(&self) -> SessionStats {
        self.sessions.stats().await
    }

    /// Close every stream and stop every instance.
    pub async fn shutdown(&self) {
        info!("engine shutting down");
        self.pump.cancel();
        self.capture.close_all(CloseReason::Shutdown).await;
        self.processes.stop_all().await;
        self.events.publish(EngineEvent::Shutdown);
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.pump.cancel();
    }
}

/// Reacts to engine events: closes the sessions of instances that are gone
/// for good and periodically reaps idle sessions.
async fn run_pump(
    mut rx: broadcast::Receiver<EngineEvent>,
    sessions: SessionManager,
    capture: CaptureRegistry,
    cancel: CancellationToken,
) {
    let mut reap = tokio::time::interval(REAP_INTERVAL);
    reap.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            event = rx.recv() => match event {
                Ok(EngineEvent::InstanceCrashed { instance_id, terminal: true, .. })
                | Ok(EngineEvent::InstanceStateChanged {
                    instance_id,
                    state: InstanceState::Stopped,
                    ..
                }) => {
                    capture
                        .close_target(
                            &ChannelTarget::Instance(instance_id.clone()),
                            CloseReason::TargetNotRunning,
                        )
                        .await;
                    let closed = sessions.close_for_instance(&instance_id).await;
                    if !closed.is_empty() {
                        info!(instance_id = %instance_id, sessions = closed.len(), "closed sessions of ended instance");
                    }
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event pump lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = reap.tick() => {
                if let Some(timeout) = sessions.defaults().await.idle_timeout() {
                    let reaped = sessions.reap_idle(timeout).await;
                    if !reaped.is_empty() {
                        debug!(count = reaped.len(), "reaped idle sessions");
                    }
                }
            }
        }
    }
    debug!("event pump stopped");
}

#[cfg(test)]
mod tests;
