//! The capture loop behind each channel.

use appshare_common::{ChannelTarget, CloseReason, EngineEvent, InstanceState, Rect};
use chrono::Utc;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::channel::{CaptureChannel, CaptureGeometry, CaptureSettings};
use super::encoder::encode_jpeg;
use super::queue::Frame;
use super::CaptureRegistry;
use crate::error::{EngineError, Result};

/// How long a resolved capture region is trusted before re-querying.
const REGION_REFRESH: Duration = Duration::from_millis(500);

#[derive(Default)]
struct RegionCache {
    region: Option<Rect>,
    refreshed: Option<Instant>,
}

pub(super) async fn run(registry: CaptureRegistry, channel: Arc<CaptureChannel>) {
    let target = channel.target().clone();
    let mut state_rx = match &target {
        ChannelTarget::Instance(id) => match registry.processes().watch(id).await {
            Some(rx) => Some(rx),
            None => {
                channel.close(CloseReason::TargetNotRunning);
                None
            }
        },
        ChannelTarget::LiveView => None,
    };

    let mut settings_rx = channel.watch_settings();
    let mut settings = *settings_rx.borrow_and_update();
    let mut ticker = ticker_for(&settings);
    let mut failures: VecDeque<Instant> = VecDeque::new();
    let mut cache = RegionCache::default();

    loop {
        tokio::select! {
            biased;
            _ = channel.cancel.cancelled() => break,
            _ = left_running(&mut state_rx) => {
                channel.close(CloseReason::TargetNotRunning);
                break;
            }
            Ok(()) = settings_rx.changed() => {
                settings = *settings_rx.borrow_and_update();
                ticker = ticker_for(&settings);
                debug!(%target, frame_rate = settings.frame_rate, quality = settings.quality, "capture settings changed");
                continue;
            }
            _ = ticker.tick() => {}
        }

        let now = Instant::now();
        while failures
            .front()
            .is_some_and(|t| now.duration_since(*t) > channel.limits.failure_window)
        {
            failures.pop_front();
        }

        match capture_once(&registry, &channel, &settings, &mut cache).await {
            Ok((frame, geometry)) => {
                channel.set_geometry(geometry).await;
                channel.deliver(frame, registry.events()).await;
                if failures.is_empty() && channel.set_degraded(false, 0).await {
                    info!(%target, "capture recovered");
                    registry
                        .events()
                        .publish(EngineEvent::ChannelRecovered { target: target.clone() });
                }
            }
            Err(e) => {
                failures.push_back(now);
                cache.refreshed = None;
                debug!(%target, error = %e, failures = failures.len(), "capture failed");
                if failures.len() > channel.limits.failure_threshold
                    && channel.set_degraded(true, failures.len()).await
                {
                    warn!(%target, failures = failures.len(), "capture degraded");
                    registry.events().publish(EngineEvent::ChannelDegraded {
                        target: target.clone(),
                        failures: failures.len(),
                    });
                }
            }
        }

        if channel.is_closing() {
            break;
        }
    }

    let reason = channel.close_reason().unwrap_or(CloseReason::NoSubscribers);
    let closed = channel.drain(reason).await;
    info!(%target, ?reason, subscribers = closed, frames = channel.last_sequence(), "capture channel closed");
    registry.events().publish(EngineEvent::ChannelClosed {
        target: target.clone(),
        reason,
    });
    registry.forget(&channel).await;
}

fn ticker_for(settings: &CaptureSettings) -> tokio::time::Interval {
    let mut ticker = tokio::time::interval(settings.period());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

/// Resolves once the watched instance is no longer Running (or gone).
async fn left_running(rx: &mut Option<watch::Receiver<InstanceState>>) {
    match rx {
        Some(rx) => {
            let _ = rx.wait_for(|state| !state.is_running()).await;
        }
        None => std::future::pending().await,
    }
}

async fn capture_once(
    registry: &CaptureRegistry,
    channel: &CaptureChannel,
    settings: &CaptureSettings,
    cache: &mut RegionCache,
) -> Result<(Frame, CaptureGeometry)> {
    let region = resolve_region(registry, channel.target(), cache).await?;
    let raw = registry.display().capture_region(region).await?;

    let (quality, max_width) = (settings.quality, settings.max_width);
    let encoded = tokio::task::spawn_blocking(move || encode_jpeg(raw, quality, max_width))
        .await
        .map_err(|e| EngineError::EncodingFailure(e.to_string()))??;

    let geometry = CaptureGeometry {
        region,
        frame_width: encoded.width,
        frame_height: encoded.height,
    };
    let frame = Frame {
        sequence: channel.next_sequence(),
        width: encoded.width,
        height: encoded.height,
        jpeg: encoded.jpeg,
        captured_at: Utc::now(),
    };
    Ok((frame, geometry))
}

/// The on-screen rectangle to capture: the whole screen for the live view,
/// the instance's main window (clipped to the screen) otherwise.
async fn resolve_region(
    registry: &CaptureRegistry,
    target: &ChannelTarget,
    cache: &mut RegionCache,
) -> Result<Rect> {
    if let (Some(region), Some(at)) = (cache.region, cache.refreshed) {
        if at.elapsed() < REGION_REFRESH {
            return Ok(region);
        }
    }

    let screen = registry
        .display()
        .screen_size()
        .await
        .map_err(|e| EngineError::DisplayUnavailable(e.to_string()))?
        .bounds();
    let region = match target {
        ChannelTarget::LiveView => screen,
        ChannelTarget::Instance(id) => {
            let (window, _) = registry
                .processes()
                .window_of(id)
                .await
                .ok_or_else(|| EngineError::not_found("window for instance", id))?;
            let windows = registry.display().query_windows().await?;
            let info = windows
                .iter()
                .find(|w| w.id == window)
                .ok_or_else(|| EngineError::not_found("window", window))?;
            info.geometry
                .intersection(&screen)
                .ok_or_else(|| EngineError::not_found("visible window area", window))?
        }
    };

    cache.region = Some(region);
    cache.refreshed = Some(Instant::now());
    Ok(region)
}
