//! Input routing: authorize, map coordinates, inject in order.

mod event;


pub use event::{Coordinates, InputEvent, InputKind};

use appshare_common::{ChannelTarget, UserId};
use appshare_display::DisplayAdapter;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::auth::Authorizer;
use crate::capture::{CaptureGeometry, CaptureRegistry};
use crate::error::{EngineError, Result};
use crate::process::{InstanceSnapshot, ProcessManager};
use crate::session::SessionManager;

/// Turns client input into display input for the instance it targets.
/// Events from one submitter are injected in submission order.
#[derive(Clone)]
pub struct InputRouter {
    processes: ProcessManager,
    sessions: SessionManager,
    capture: CaptureRegistry,
    display: Arc<dyn DisplayAdapter>,
    authorizer: Arc<dyn Authorizer>,
    lanes: Arc<Mutex<HashMap<UserId, Arc<Mutex<()>>>>>,
}

impl InputRouter {
    pub fn new(
        processes: ProcessManager,
        sessions: SessionManager,
        capture: CaptureRegistry,
        display: Arc<dyn DisplayAdapter>,
        authorizer: Arc<dyn Authorizer>,
    ) -> Self {
        Self {
            processes,
            sessions,
            capture,
            display,
            authorizer,
            lanes: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub async fn submit(&self, event: InputEvent) -> Result<()> {
        let snapshot = self
            .processes
            .snapshot(&event.target)
            .await
            .filter(|s| s.state.is_running())
            .ok_or_else(|| {
                EngineError::InputTargetInvalid(format!("{} is not running", event.target))
            })?;

        if !self.may_control(&snapshot, &event.submitter).await {
            warn!(instance_id = %event.target, user = %event.submitter, "input rejected: not authorized");
            return Err(EngineError::InputTargetInvalid(format!(
                "{} may not control {}",
                event.submitter, event.target
            )));
        }

        let geometry = match event.kind.position() {
            Some(_) => Some(self.geometry_for(&snapshot).await?),
            None => None,
        };
        let action = event.kind.to_action(geometry.as_ref()).ok_or_else(|| {
            EngineError::InputTargetInvalid(format!("{} has no capture geometry", event.target))
        })?;
        action.validate()?;

        let lane = self.lane(&event.submitter).await;
        let turn = lane.lock().await;
        if event.kind.wants_focus() {
            if let Some(window) = snapshot.window {
                if let Err(e) = self.display.focus_window(window).await {
                    debug!(instance_id = %event.target, %window, error = %e, "focus failed");
                }
            }
        }
        let injected = self.display.inject_input(&action).await;
        drop(turn);
        self.release_lane(&event.submitter, lane).await;
        injected?;

        self.sessions.touch_instance(&event.target).await;
        Ok(())
    }

    async fn may_control(&self, snapshot: &InstanceSnapshot, user: &UserId) -> bool {
        snapshot.owner == *user
            || self.sessions.is_participant(&snapshot.id, user).await
            || self.authorizer.can_control(user, snapshot)
    }

    /// The last captured geometry, or the window's own rectangle at 1:1
    /// when nobody is watching the instance.
    async fn geometry_for(&self, snapshot: &InstanceSnapshot) -> Result<CaptureGeometry> {
        let target = ChannelTarget::Instance(snapshot.id.clone());
        if let Some(geometry) = self.capture.geometry(&target).await {
            return Ok(geometry);
        }
        let window = snapshot.window.ok_or_else(|| {
            EngineError::InputTargetInvalid(format!("{} has no window", snapshot.id))
        })?;
        let windows = self.display.query_windows().await?;
        let info = windows.iter().find(|w| w.id == window).ok_or_else(|| {
            EngineError::InputTargetInvalid(format!("window {window} of {} is gone", snapshot.id))
        })?;
        Ok(CaptureGeometry {
            region: info.geometry,
            frame_width: info.geometry.width,
            frame_height: info.geometry.height,
        })
    }

    async fn lane(&self, user: &UserId) -> Arc<Mutex<()>> {
        self.lanes
            .lock()
            .await
            .entry(user.clone())
            .or_default()
            .clone()
    }

    /// Forget a submitter's lane once nobody else is queued on it.
    async fn release_lane(&self, user: &UserId, lane: Arc<Mutex<()>>) {
        let mut lanes = self.lanes.lock().await;
        if Arc::strong_count(&lane) == 2 {
            lanes.remove(user);
        }
    }
}
