//! One capture channel: its settings, subscribers and fan-out.

use appshare_common::{ChannelTarget, CloseReason, EngineEvent, EventBus, Rect, SubscriberId};
use appshare_config::CaptureConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::{watch, Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::queue::{ChannelMessage, Frame, SubscriberQueue, Subscription};

/// Live-adjustable capture parameters, re-read on every tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CaptureSettings {
    pub frame_rate: u32,
    pub quality: u8,
    pub max_width: u32,
}

impl CaptureSettings {
    pub fn from_config(config: &CaptureConfig) -> Self {
        Self {
            frame_rate: config.frame_rate,
            quality: config.quality,
            max_width: config.max_width,
        }
    }

    pub fn period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.frame_rate.max(1) as f64)
    }
}

/// Where the last frame came from and how big it was after scaling.
/// Input coordinates are mapped back through this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CaptureGeometry {
    pub region: Rect,
    pub frame_width: u32,
    pub frame_height: u32,
}

/// Limits fixed for the channel's lifetime.
#[derive(Debug, Clone)]
pub(crate) struct ChannelLimits {
    pub queue_depth: usize,
    pub max_consecutive_drops: u32,
    pub failure_threshold: usize,
    pub failure_window: Duration,
}

impl ChannelLimits {
    pub fn from_config(config: &CaptureConfig) -> Self {
        Self {
            queue_depth: config.queue_depth,
            max_consecutive_drops: config.max_consecutive_drops,
            failure_threshold: config.failure_threshold,
            failure_window: config.failure_window(),
        }
    }
}

/// Summary for listings.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelInfo {
    pub target: ChannelTarget,
    pub subscribers: usize,
    pub last_sequence: u64,
    pub degraded: bool,
    pub settings: CaptureSettings,
}

pub struct CaptureChannel {
    target: ChannelTarget,
    settings: watch::Sender<CaptureSettings>,
    pub(crate) limits: ChannelLimits,
    subscribers: Mutex<HashMap<SubscriberId, Arc<SubscriberQueue>>>,
    sequence: AtomicU64,
    geometry: RwLock<Option<CaptureGeometry>>,
    degraded: AtomicBool,
    closing: AtomicBool,
    close_reason: OnceLock<CloseReason>,
    pub(crate) cancel: CancellationToken,
}

impl CaptureChannel {
    pub(crate) fn new(
        target: ChannelTarget,
        settings: CaptureSettings,
        limits: ChannelLimits,
    ) -> Self {
        let (settings, _) = watch::channel(settings);
        Self {
            target,
            settings,
            limits,
            subscribers: Mutex::new(HashMap::new()),
            sequence: AtomicU64::new(0),
            geometry: RwLock::new(None),
            degraded: AtomicBool::new(false),
            closing: AtomicBool::new(false),
            close_reason: OnceLock::new(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn target(&self) -> &ChannelTarget {
        &self.target
    }

    pub fn settings(&self) -> CaptureSettings {
        *self.settings.borrow()
    }

    /// Takes effect on the next tick.
    pub fn update_settings(&self, settings: CaptureSettings) {
        self.settings.send_replace(settings);
    }

    pub(crate) fn watch_settings(&self) -> watch::Receiver<CaptureSettings> {
        self.settings.subscribe()
    }

    pub async fn geometry(&self) -> Option<CaptureGeometry> {
        *self.geometry.read().await
    }

    pub(crate) async fn set_geometry(&self, geometry: CaptureGeometry) {
        *self.geometry.write().await = Some(geometry);
    }

    pub fn last_sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }

    pub(crate) fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }

    pub fn is_closing(&self) -> bool {
        self.closing.load(Ordering::SeqCst)
    }

    pub(crate) fn close_reason(&self) -> Option<CloseReason> {
        self.close_reason.get().copied()
    }

    /// Ask the worker to tear the channel down. The first reason wins.
    pub(crate) fn close(&self, reason: CloseReason) {
        let _ = self.close_reason.set(reason);
        self.closing.store(true, Ordering::SeqCst);
        self.cancel.cancel();
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.lock().await.len()
    }

    pub async fn info(&self) -> ChannelInfo {
        ChannelInfo {
            target: self.target.clone(),
            subscribers: self.subscriber_count().await,
            last_sequence: self.last_sequence(),
            degraded: self.is_degraded(),
            settings: self.settings(),
        }
    }

    /// `None` when the channel is already closing.
    pub(crate) async fn add_subscriber(&self) -> Option<Subscription> {
        let mut subscribers = self.subscribers.lock().await;
        if self.is_closing() {
            return None;
        }
        let id = SubscriberId::new();
        let queue = Arc::new(SubscriberQueue::new(self.limits.queue_depth));
        subscribers.insert(id.clone(), queue.clone());
        debug!(target = %self.target, subscriber_id = %id, count = subscribers.len(), "subscriber added");
        Some(Subscription::new(id, self.target.clone(), queue))
    }

    /// Returns whether the subscriber existed. Removing the last one
    /// closes the channel.
    pub(crate) async fn remove_subscriber(&self, id: &SubscriberId) -> bool {
        let mut subscribers = self.subscribers.lock().await;
        let Some(queue) = subscribers.remove(id) else {
            return false;
        };
        queue
            .close(ChannelMessage::Closed(CloseReason::Unsubscribed))
            .await;
        if subscribers.is_empty() {
            self.close(CloseReason::NoSubscribers);
        }
        true
    }

    /// Fan a frame out. Subscribers whose consumer is gone, or who have
    /// dropped too many frames in a row, are removed.
    pub(crate) async fn deliver(&self, frame: Frame, events: &EventBus) {
        let frame = Arc::new(frame);
        let mut subscribers = self.subscribers.lock().await;
        let mut removed = Vec::new();
        for (id, queue) in subscribers.iter() {
            if queue.consumer_gone() {
                removed.push((id.clone(), None));
                continue;
            }
            let drops = queue.push_frame(frame.clone()).await;
            if drops > self.limits.max_consecutive_drops {
                removed.push((id.clone(), Some(CloseReason::SlowConsumer)));
            }
        }

        let removed_any = !removed.is_empty();
        for (id, reason) in removed {
            let Some(queue) = subscribers.remove(&id) else {
                continue;
            };
            match reason {
                Some(reason) => {
                    warn!(target = %self.target, subscriber_id = %id, "dropping slow subscriber");
                    queue.close(ChannelMessage::Disconnected(reason)).await;
                    events.publish(EngineEvent::SubscriberDropped {
                        target: self.target.clone(),
                        subscriber_id: id,
                        reason,
                    });
                }
                None => debug!(target = %self.target, subscriber_id = %id, "consumer gone"),
            }
        }

        if removed_any && subscribers.is_empty() {
            self.close(CloseReason::NoSubscribers);
        }
    }

    pub(crate) async fn set_degraded(&self, degraded: bool, failures: usize) -> bool {
        if self.degraded.swap(degraded, Ordering::SeqCst) == degraded {
            return false;
        }
        let message = if degraded {
            ChannelMessage::Degraded { failures }
        } else {
            ChannelMessage::Recovered
        };
        for queue in self.subscribers.lock().await.values() {
            queue.push_control(message.clone()).await;
        }
        true
    }

    /// Close every remaining subscriber with `reason`.
    pub(crate) async fn drain(&self, reason: CloseReason) -> usize {
        self.closing.store(true, Ordering::SeqCst);
        let drained: Vec<_> = self.subscribers.lock().await.drain().collect();
        for (_, queue) in &drained {
            queue.close(ChannelMessage::Closed(reason)).await;
        }
        drained.len()
    }
}

impl std::fmt::Debug for CaptureChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureChannel")
            .field("target", &self.target)
            .field("sequence", &self.last_sequence())
            .field("closing", &self.is_closing())
            .finish()
    }
}
