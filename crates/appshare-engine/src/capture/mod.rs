//! Capture and broadcast.
//!
//! One channel per target, created lazily by the first subscriber and torn
//! down when the last one leaves or the target stops running. Every
//! subscriber of a channel sees the same sequence-numbered frames through
//! its own bounded queue, so a slow consumer never holds up the others.

mod channel;
mod encoder;
mod queue;
mod worker;


pub use channel::{CaptureChannel, CaptureGeometry, CaptureSettings, ChannelInfo};
pub use encoder::{encode_jpeg, EncodedFrame};
pub use queue::{ChannelMessage, Frame, Subscription};

use appshare_common::{ChannelTarget, CloseReason, EngineEvent, EventBus, SubscriberId};
use appshare_config::CaptureConfig;
use appshare_display::DisplayAdapter;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use crate::error::{EngineError, Result};
use crate::process::ProcessManager;
use channel::ChannelLimits;

struct Inner {
    processes: ProcessManager,
    display: Arc<dyn DisplayAdapter>,
    events: EventBus,
    defaults: RwLock<CaptureConfig>,
    channels: RwLock<HashMap<ChannelTarget, Arc<CaptureChannel>>>,
}

/// All live capture channels. Cheap to clone.
#[derive(Clone)]
pub struct CaptureRegistry {
    inner: Arc<Inner>,
}

impl CaptureRegistry {
    pub fn new(
        defaults: CaptureConfig,
        processes: ProcessManager,
        display: Arc<dyn DisplayAdapter>,
        events: EventBus,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                processes,
                display,
                events,
                defaults: RwLock::new(defaults),
                channels: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Attach a new subscriber to `target`, creating its channel if needed.
    /// Instance targets must be Running.
    pub async fn subscribe(&self, target: ChannelTarget) -> Result<Subscription> {
        if let ChannelTarget::Instance(id) = &target {
            let running = self
                .inner
                .processes
                .snapshot(id)
                .await
                .is_some_and(|s| s.state.is_running());
            if !running {
                return Err(EngineError::not_found("running instance", id));
            }
        }

        loop {
            if let Some(subscription) = self.attach(&target).await {
                return Ok(subscription);
            }
            tokio::task::yield_now().await;
        }
    }

    /// Returns whether the subscriber was attached to `target`.
    pub async fn unsubscribe(&self, target: &ChannelTarget, subscriber: &SubscriberId) -> bool {
        match self.channel(target).await {
            Some(channel) => channel.remove_subscriber(subscriber).await,
            None => false,
        }
    }

    pub async fn channel(&self, target: &ChannelTarget) -> Option<Arc<CaptureChannel>> {
        self.inner.channels.read().await.get(target).cloned()
    }

    /// Geometry of the last frame captured for `target`.
    pub async fn geometry(&self, target: &ChannelTarget) -> Option<CaptureGeometry> {
        match self.channel(target).await {
            Some(channel) => channel.geometry().await,
            None => None,
        }
    }

    pub async fn list(&self) -> Vec<ChannelInfo> {
        let channels: Vec<_> = self.inner.channels.read().await.values().cloned().collect();
        let mut out = Vec::with_capacity(channels.len());
        for channel in channels {
            out.push(channel.info().await);
        }
        out
    }

    /// Change one channel's frame rate, quality or width cap.
    pub async fn update_settings(
        &self,
        target: &ChannelTarget,
        settings: CaptureSettings,
    ) -> Result<()> {
        if !(1..=60).contains(&settings.frame_rate) || settings.quality == 0 || settings.quality > 100 {
            return Err(EngineError::NotAllowed(format!(
                "frame_rate must be 1-60 and quality 1-100, got {} / {}",
                settings.frame_rate, settings.quality
            )));
        }
        let channel = self
            .channel(target)
            .await
            .ok_or_else(|| EngineError::not_found("channel", target))?;
        channel.update_settings(settings);
        Ok(())
    }

    /// New defaults apply to channels created later and are pushed to the
    /// live ones.
    pub async fn apply_defaults(&self, defaults: CaptureConfig) {
        let settings = CaptureSettings::from_config(&defaults);
        *self.inner.defaults.write().await = defaults;
        for channel in self.inner.channels.read().await.values() {
            channel.update_settings(settings);
        }
    }

    /// Tear down the channel for `target`, if any.
    pub async fn close_target(&self, target: &ChannelTarget, reason: CloseReason) {
        if let Some(channel) = self.channel(target).await {
            channel.close(reason);
        }
    }

    pub async fn close_all(&self, reason: CloseReason) {
        for channel in self.inner.channels.read().await.values() {
            channel.close(reason);
        }
    }

    pub(crate) fn processes(&self) -> &ProcessManager {
        &self.inner.processes
    }

    pub(crate) fn display(&self) -> &Arc<dyn DisplayAdapter> {
        &self.inner.display
    }

    pub(crate) fn events(&self) -> &EventBus {
        &self.inner.events
    }

    /// Join the live channel for `target`, or open a new one with this
    /// subscriber already attached. `None` if the channel closed underneath.
    async fn attach(&self, target: &ChannelTarget) -> Option<Subscription> {
        let mut channels = self.inner.channels.write().await;
        if let Some(existing) = channels.get(target) {
            if !existing.is_closing() {
                return existing.add_subscriber().await;
            }
        }

        let defaults = self.inner.defaults.read().await.clone();
        let channel = Arc::new(CaptureChannel::new(
            target.clone(),
            CaptureSettings::from_config(&defaults),
            ChannelLimits::from_config(&defaults),
        ));
        let subscription = channel.add_subscriber().await;
        channels.insert(target.clone(), channel.clone());
        drop(channels);

        info!(%target, frame_rate = defaults.frame_rate, "capture channel opened");
        self.inner.events.publish(EngineEvent::ChannelOpened {
            target: target.clone(),
        });
        tokio::spawn(worker::run(self.clone(), channel));
        subscription
    }

    /// Drop `channel` from the table unless it has already been replaced.
    pub(crate) async fn forget(&self, channel: &Arc<CaptureChannel>) {
        let mut channels = self.inner.channels.write().await;
        if channels
            .get(channel.target())
            .is_some_and(|current| Arc::ptr_eq(current, channel))
        {
            channels.remove(channel.target());
        }
    }
}
