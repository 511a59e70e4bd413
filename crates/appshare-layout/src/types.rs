//! Layout engine parameters and output type.

use appshare_common::{Rect, WindowId};
use serde::{Deserialize, Serialize};

/// Target rectangle for one window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub window: WindowId,
    pub rect: Rect,
}

impl Placement {
    pub fn new(window: WindowId, rect: Rect) -> Self {
        Self { window, rect }
    }
}

/// Parameters shared by every layout kind.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutEngine {
    /// Gap in pixels between tiled and grid cells.
    pub gap: u32,
    /// Margin in pixels between the screen edge and the usable area.
    pub outer_margin: u32,
    /// Diagonal offset between cascaded windows.
    pub cascade_step: u32,
    /// Cascaded window size as a fraction of the usable area.
    pub cascade_scale: f64,
}

impl Default for LayoutEngine {
    fn default() -> Self {
        Self {
            gap: 0,
            outer_margin: 0,
            cascade_step: 30,
            cascade_scale: 0.5,
        }
    }
}
