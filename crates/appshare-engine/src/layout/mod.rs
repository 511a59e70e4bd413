//! Compute-then-apply window layout against the live display, single
//! window operations, and named presets.

mod preset;

use appshare_common::{EngineEvent, EventBus, Rect, WindowId, WindowInfo};
use appshare_config::LayoutConfig;
use appshare_display::DisplayAdapter;
use appshare_layout::{LayoutEngine, LayoutError, LayoutKind, Placement, SnapZone};
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::error::{EngineError, Result};

pub use preset::{LayoutPreset, PresetConfig, PresetOutcome, PresetSnap};

pub fn layout_engine(config: &LayoutConfig) -> LayoutEngine {
    LayoutEngine {
        gap: config.gap,
        outer_margin: config.outer_margin,
        cascade_step: config.cascade_step,
        cascade_scale: config.cascade_scale,
    }
}

/// Serializes every geometry change on one display. Layouts and snaps take
/// the same lock, so the last one to acquire it wins.
#[derive(Clone)]
pub struct LayoutCoordinator {
    display: Arc<dyn DisplayAdapter>,
    config: Arc<RwLock<LayoutConfig>>,
    apply_lock: Arc<Mutex<()>>,
    presets: Arc<RwLock<BTreeMap<String, LayoutPreset>>>,
    events: EventBus,
}

impl LayoutCoordinator {
    pub fn new(config: LayoutConfig, display: Arc<dyn DisplayAdapter>, events: EventBus) -> Self {
        Self {
            display,
            config: Arc::new(RwLock::new(config)),
            apply_lock: Arc::new(Mutex::new(())),
            presets: Arc::new(RwLock::new(BTreeMap::new())),
            events,
        }
    }

    pub async fn update_config(&self, config: LayoutConfig) {
        *self.config.write().await = config;
    }

    /// Snapshot the windows, compute, confirm the window set did not change
    /// meanwhile, then apply every placement.
    pub async fn apply(&self, kind: LayoutKind) -> Result<Vec<Placement>> {
        let config = self.config.read().await.clone();
        let engine = layout_engine(&config);
        let attempts = config.max_attempts.max(1);

        let _guard = self.apply_lock.lock().await;
        let screen = self.display.screen_size().await?;
        for attempt in 1..=attempts {
            let before = self.display.query_windows().await?;
            let placements = engine.compute(kind, screen, &before)?;
            let after = self.display.query_windows().await?;
            if fingerprint(&before) != fingerprint(&after) {
                debug!(%kind, attempt, "window set changed during layout, recomputing");
                continue;
            }

            for placement in &placements {
                self.display
                    .set_window_geometry(placement.window, placement.rect)
                    .await?;
            }
            info!(%kind, windows = placements.len(), attempt, "layout applied");
            self.events.publish(EngineEvent::LayoutApplied {
                kind: kind.name().to_string(),
                windows: placements.len(),
            });
            return Ok(placements);
        }
        Err(LayoutError::Unstable { attempts }.into())
    }

    /// Move one window into a screen zone.
    pub async fn snap(&self, window: WindowId, zone: SnapZone) -> Result<Placement> {
        let engine = layout_engine(&*self.config.read().await);

        let _guard = self.apply_lock.lock().await;
        let screen = self.display.screen_size().await?;
        let rect = engine.snap_rect(zone, screen)?;
        self.require_window(window).await?;
        self.display.set_window_geometry(window, rect).await?;

        info!(%window, zone = zone.as_str(), %rect, "window snapped");
        self.events.publish(EngineEvent::LayoutApplied {
            kind: format!("snap:{}", zone.as_str()),
            windows: 1,
        });
        Ok(Placement::new(window, rect))
    }

    /// Move and resize one window. `rect` is clipped to the screen.
    pub async fn resize(&self, window: WindowId, rect: Rect) -> Result<Placement> {
        let _guard = self.apply_lock.lock().await;
        let screen = self.display.screen_size().await?;
        let clipped = rect
            .intersection(&screen.bounds())
            .filter(|r| !r.is_empty())
            .ok_or_else(|| EngineError::InvalidArgument(format!("{rect} is off screen")))?;
        self.require_window(window).await?;
        self.display.set_window_geometry(window, clipped).await?;

        info!(%window, rect = %clipped, "window resized");
        self.publish_single("resize");
        Ok(Placement::new(window, clipped))
    }

    /// Give one window the whole usable area.
    pub async fn maximize(&self, window: WindowId) -> Result<Placement> {
        let engine = layout_engine(&*self.config.read().await);

        let _guard = self.apply_lock.lock().await;
        let screen = self.display.screen_size().await?;
        let rect = engine.usable_area(screen)?;
        self.require_window(window).await?;
        self.display.set_window_geometry(window, rect).await?;

        info!(%window, %rect, "window maximized");
        self.publish_single("maximize");
        Ok(Placement::new(window, rect))
    }

    pub async fn minimize(&self, window: WindowId) -> Result<()> {
        let _guard = self.apply_lock.lock().await;
        self.require_window(window).await?;
        self.display.minimize_window(window).await?;
        info!(%window, "window minimized");
        self.publish_single("minimize");
        Ok(())
    }

    pub async fn close(&self, window: WindowId) -> Result<()> {
        let _guard = self.apply_lock.lock().await;
        self.require_window(window).await?;
        self.display.close_window(window).await?;
        info!(%window, "window closed");
        self.publish_single("close");
        Ok(())
    }

    pub async fn focus(&self, window: WindowId) -> Result<()> {
        let _guard = self.apply_lock.lock().await;
        self.require_window(window).await?;
        self.display.focus_window(window).await?;
        debug!(%window, "window focused");
        Ok(())
    }

    // -- presets ------------------------------------------------------------

    /// Save `config` under `name`, replacing any preset of the same name.
    pub async fn save_preset(&self, name: &str, config: PresetConfig) -> Result<LayoutPreset> {
        let name = name.trim();
        if name.is_empty() {
            return Err(EngineError::InvalidArgument("preset name is empty".into()));
        }
        if config.is_empty() {
            return Err(EngineError::InvalidArgument(format!(
                "preset {name} has neither a layout nor snaps"
            )));
        }
        let preset = LayoutPreset {
            name: name.to_string(),
            config,
            created_at: Utc::now(),
        };
        let replaced = self
            .presets
            .write()
            .await
            .insert(preset.name.clone(), preset.clone())
            .is_some();
        info!(preset = %preset.name, replaced, "layout preset saved");
        Ok(preset)
    }

    /// Every saved preset, by name.
    pub async fn presets(&self) -> Vec<LayoutPreset> {
        self.presets.read().await.values().cloned().collect()
    }

    pub async fn delete_preset(&self, name: &str) -> Result<()> {
        let name = name.trim();
        if self.presets.write().await.remove(name).is_none() {
            return Err(EngineError::not_found("layout preset", name));
        }
        info!(preset = name, "layout preset deleted");
        Ok(())
    }

    /// Run the preset's layout, then its snaps. Snaps for windows that have
    /// since gone away are skipped.
    pub async fn apply_preset(&self, name: &str) -> Result<PresetOutcome> {
        let preset = self
            .presets
            .read()
            .await
            .get(name.trim())
            .cloned()
            .ok_or_else(|| EngineError::not_found("layout preset", name))?;

        let mut outcome = PresetOutcome::default();
        if let Some(kind) = preset.config.tiling {
            outcome.placements = self.apply(kind).await?;
        }
        for snap in &preset.config.snaps {
            match self.snap(snap.window, snap.zone).await {
                Ok(placement) => outcome.placements.push(placement),
                Err(EngineError::Layout(LayoutError::WindowNotFound(window))) => {
                    debug!(preset = %preset.name, %window, "window gone, snap skipped");
                    outcome.skipped.push(window);
                }
                Err(e) => return Err(e),
            }
        }
        info!(
            preset = %preset.name,
            placed = outcome.placements.len(),
            skipped = outcome.skipped.len(),
            "layout preset applied"
        );
        Ok(outcome)
    }

    async fn require_window(&self, window: WindowId) -> Result<()> {
        let exists = self
            .display
            .query_windows()
            .await?
            .iter()
            .any(|w| w.id == window);
        if !exists {
            return Err(LayoutError::WindowNotFound(window).into());
        }
        Ok(())
    }

    fn publish_single(&self, action: &str) {
        self.events.publish(EngineEvent::LayoutApplied {
            kind: format!("window:{action}"),
            windows: 1,
        });
    }
}

/// The layout-relevant part of a window list.
fn fingerprint(windows: &[WindowInfo]) -> Vec<(WindowId, bool)> {
    let mut out: Vec<_> = windows
        .iter()
        .filter(|w| w.is_layoutable())
        .map(|w| (w.id, w.focused))
        .collect();
    out.sort();
    out
}
