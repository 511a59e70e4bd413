//! Named layouts saved for reuse.

use appshare_common::WindowId;
use appshare_layout::{LayoutKind, Placement, SnapZone};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresetSnap {
    pub window: WindowId,
    pub zone: SnapZone,
}

/// What a preset does when applied: an optional full layout, then the
/// listed snaps in order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresetConfig {
    #[serde(default)]
    pub tiling: Option<LayoutKind>,
    #[serde(default)]
    pub snaps: Vec<PresetSnap>,
}

impl PresetConfig {
    pub fn is_empty(&self) -> bool {
        self.tiling.is_none() && self.snaps.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayoutPreset {
    pub name: String,
    #[serde(flatten)]
    pub config: PresetConfig,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PresetOutcome {
    pub placements: Vec<Placement>,
    /// Snap entries whose window no longer exists.
    pub skipped: Vec<WindowId>,
}
