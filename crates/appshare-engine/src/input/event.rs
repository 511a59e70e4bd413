//! Input events as submitted by clients, before mapping to the display.

use appshare_common::{InstanceId, UserId};
use appshare_display::{
    InputAction, KeyAction, Modifier, MouseButton, PointerAction, ScrollDirection,
};
use serde::{Deserialize, Serialize};

use crate::capture::CaptureGeometry;

/// Where a pointer or scroll event happened, in terms of the frame the
/// client was looking at.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "space", rename_all = "snake_case")]
pub enum Coordinates {
    /// Fractions of the frame, `[0, 1]` on both axes.
    Normalized { x: f64, y: f64 },
    /// Pixels of the last frame the client received.
    FramePixels { x: f64, y: f64 },
}

impl Coordinates {
    /// Absolute display position inside `geometry.region`, clamped to it.
    pub fn to_display(&self, geometry: &CaptureGeometry) -> (i32, i32) {
        let (fx, fy) = match *self {
            Coordinates::Normalized { x, y } => (x, y),
            Coordinates::FramePixels { x, y } => (
                x / geometry.frame_width.max(1) as f64,
                y / geometry.frame_height.max(1) as f64,
            ),
        };
        let region = geometry.region;
        (
            region.x + scale(fx, region.width),
            region.y + scale(fy, region.height),
        )
    }
}

fn scale(fraction: f64, extent: u32) -> i32 {
    if extent == 0 {
        return 0;
    }
    let fraction = if fraction.is_nan() {
        0.0
    } else {
        fraction.clamp(0.0, 1.0)
    };
    let offset = (fraction * extent as f64).floor() as i64;
    offset.min(extent as i64 - 1) as i32
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputKind {
    Pointer {
        position: Coordinates,
        action: PointerAction,
        #[serde(default)]
        button: MouseButton,
    },
    Key {
        key: String,
        #[serde(default)]
        modifiers: Vec<Modifier>,
        #[serde(default)]
        action: KeyAction,
    },
    Scroll {
        position: Coordinates,
        direction: ScrollDirection,
        #[serde(default = "default_scroll_amount")]
        amount: u32,
    },
}

fn default_scroll_amount() -> u32 {
    1
}

impl InputKind {
    pub fn position(&self) -> Option<&Coordinates> {
        match self {
            InputKind::Pointer { position, .. } | InputKind::Scroll { position, .. } => {
                Some(position)
            }
            InputKind::Key { .. } => None,
        }
    }

    /// Events that should land on a focused target window.
    pub(crate) fn wants_focus(&self) -> bool {
        matches!(
            self,
            InputKind::Key { .. }
                | InputKind::Pointer {
                    action: PointerAction::Down | PointerAction::Click,
                    ..
                }
        )
    }

    /// Resolve into a display action. `geometry` is required for
    /// positional events.
    pub(crate) fn to_action(&self, geometry: Option<&CaptureGeometry>) -> Option<InputAction> {
        Some(match self {
            InputKind::Pointer {
                position,
                action,
                button,
            } => {
                let (x, y) = position.to_display(geometry?);
                InputAction::Pointer {
                    x,
                    y,
                    action: *action,
                    button: *button,
                }
            }
            InputKind::Key {
                key,
                modifiers,
                action,
            } => InputAction::Key {
                key: key.clone(),
                modifiers: modifiers.clone(),
                action: *action,
            },
            InputKind::Scroll {
                position,
                direction,
                amount,
            } => {
                let (x, y) = position.to_display(geometry?);
                InputAction::Scroll {
                    x,
                    y,
                    direction: *direction,
                    amount: *amount,
                }
            }
        })
    }
}

/// One input event aimed at an instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputEvent {
    pub target: InstanceId,
    pub submitter: UserId,
    #[serde(flatten)]
    pub kind: InputKind,
}
