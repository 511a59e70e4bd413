use serde::{Deserialize, Serialize};
use std::fmt;

use crate::id::{InstanceId, WindowId};

/// Integer pixel rectangle in display coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> i64 {
        self.x as i64 + self.width as i64
    }

    pub fn bottom(&self) -> i64 {
        self.y as i64 + self.height as i64
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// True if the two rectangles share any interior pixel.
    pub fn overlaps(&self, other: &Rect) -> bool {
        (self.x as i64) < other.right()
            && (other.x as i64) < self.right()
            && (self.y as i64) < other.bottom()
            && (other.y as i64) < self.bottom()
    }

    pub fn contains_point(&self, x: i32, y: i32) -> bool {
        x >= self.x && (x as i64) < self.right() && y >= self.y && (y as i64) < self.bottom()
    }

    /// Shrink by `inset` pixels on every side, saturating at zero size.
    pub fn inset(&self, inset: u32) -> Rect {
        let double = inset.saturating_mul(2);
        Rect {
            x: self.x.saturating_add(inset as i32),
            y: self.y.saturating_add(inset as i32),
            width: self.width.saturating_sub(double),
            height: self.height.saturating_sub(double),
        }
    }

    /// Overlapping part of two rectangles, or `None` if they are disjoint.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let left = (self.x as i64).max(other.x as i64);
        let top = (self.y as i64).max(other.y as i64);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        if right <= left || bottom <= top {
            return None;
        }
        Some(Rect::new(
            left as i32,
            top as i32,
            (right - left) as u32,
            (bottom - top) as u32,
        ))
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}+{}+{}", self.width, self.height, self.x, self.y)
    }
}

/// Size of the display surface in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

impl ScreenSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.width, self.height)
    }
}

impl Default for ScreenSize {
    fn default() -> Self {
        Self::new(1920, 1080)
    }
}

/// A top-level window as reported by the display.
///
/// `instance_id` is filled in by whoever resolves `pid` against the
/// instance table; the display itself never knows about instances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowInfo {
    pub id: WindowId,
    pub pid: Option<u32>,
    pub instance_id: Option<InstanceId>,
    pub title: String,
    pub geometry: Rect,
    /// Stacking position, higher is closer to the viewer.
    pub z_order: u32,
    pub focused: bool,
    pub minimized: bool,
    /// Monotonic creation counter assigned by the display.
    pub created: u64,
}

impl WindowInfo {
    pub fn new(id: WindowId, geometry: Rect) -> Self {
        Self {
            id,
            pid: None,
            instance_id: None,
            title: String::new(),
            geometry,
            z_order: 0,
            focused: false,
            minimized: false,
            created: id.0,
        }
    }

    /// Whether the window takes part in layouts.
    pub fn is_layoutable(&self) -> bool {
        !self.minimized && !self.geometry.is_empty()
    }
}

/// Lifecycle state of a supervised application instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceState {
    Starting,
    Running,
    Stopping,
    Stopped,
    Crashed,
    Restarting,
}

impl InstanceState {
    /// `Stopped` is always terminal. `Crashed` is terminal only once the
    /// restart budget is spent, which the state alone cannot tell; callers
    /// that need that distinction track it separately.
    pub fn is_stopped(&self) -> bool {
        matches!(self, Self::Stopped)
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

impl fmt::Display for InstanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Crashed => "crashed",
            Self::Restarting => "restarting",
        };
        f.write_str(s)
    }
}

/// What a capture channel captures.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "instance_id", rename_all = "snake_case")]
pub enum ChannelTarget {
    /// The window of one application instance.
    Instance(InstanceId),
    /// The whole display.
    LiveView,
}

impl ChannelTarget {
    pub fn instance(&self) -> Option<&InstanceId> {
        match self {
            Self::Instance(id) => Some(id),
            Self::LiveView => None,
        }
    }
}

impl fmt::Display for ChannelTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Instance(id) => write!(f, "instance:{id}"),
            Self::LiveView => f.write_str("live-view"),
        }
    }
}
