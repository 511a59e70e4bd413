//! The display surface capability.

use appshare_common::{Rect, ScreenSize, WindowId, WindowInfo};
use async_trait::async_trait;

use crate::input::InputAction;
use crate::Result;

/// One captured region as tightly packed 8-bit RGB.
#[derive(Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    pub rgb: Vec<u8>,
}

impl RawFrame {
    /// Returns `None` when `rgb` is not exactly `width * height * 3` bytes.
    pub fn new(width: u32, height: u32, rgb: Vec<u8>) -> Option<Self> {
        (rgb.len() as u64 == width as u64 * height as u64 * 3).then_some(Self {
            width,
            height,
            rgb,
        })
    }

    pub fn solid(width: u32, height: u32, color: [u8; 3]) -> Self {
        let rgb = color
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 3)
            .collect();
        Self { width, height, rgb }
    }
}

impl std::fmt::Debug for RawFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.rgb.len())
            .finish()
    }
}

/// Platform-agnostic access to the display the shared applications run on.
///
/// Coordinates are absolute display pixels.
#[async_trait]
pub trait DisplayAdapter: Send + Sync {
    async fn screen_size(&self) -> Result<ScreenSize>;

    /// Capture `region`, clipped to the screen by the implementation.
    async fn capture_region(&self, region: Rect) -> Result<RawFrame>;

    /// All top-level windows, including minimized ones.
    async fn query_windows(&self) -> Result<Vec<WindowInfo>>;

    async fn set_window_geometry(&self, window: WindowId, rect: Rect) -> Result<()>;

    async fn focus_window(&self, window: WindowId) -> Result<()>;

    async fn minimize_window(&self, window: WindowId) -> Result<()>;

    /// Ask the window to close. The owning process may keep running.
    async fn close_window(&self, window: WindowId) -> Result<()>;

    async fn inject_input(&self, action: &InputAction) -> Result<()>;
}
