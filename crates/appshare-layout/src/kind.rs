//! Layout kinds and snap zones.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::LayoutError;

/// Requested arrangement for all layoutable windows on a display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LayoutKind {
    Tiled,
    Cascade,
    Grid {
        #[serde(default)]
        rows: Option<u32>,
        #[serde(default)]
        cols: Option<u32>,
    },
    Maximize,
}

impl LayoutKind {
    pub fn name(&self) -> &'static str {
        match self {
            LayoutKind::Tiled => "tiled",
            LayoutKind::Cascade => "cascade",
            LayoutKind::Grid { .. } => "grid",
            LayoutKind::Maximize => "maximize",
        }
    }
}

impl fmt::Display for LayoutKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Screen region a single window can be snapped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SnapZone {
    Left,
    Right,
    Top,
    Bottom,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl SnapZone {
    pub const ALL: [SnapZone; 8] = [
        SnapZone::Left,
        SnapZone::Right,
        SnapZone::Top,
        SnapZone::Bottom,
        SnapZone::TopLeft,
        SnapZone::TopRight,
        SnapZone::BottomLeft,
        SnapZone::BottomRight,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SnapZone::Left => "left",
            SnapZone::Right => "right",
            SnapZone::Top => "top",
            SnapZone::Bottom => "bottom",
            SnapZone::TopLeft => "top-left",
            SnapZone::TopRight => "top-right",
            SnapZone::BottomLeft => "bottom-left",
            SnapZone::BottomRight => "bottom-right",
        }
    }
}

impl fmt::Display for SnapZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SnapZone {
    type Err = LayoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SnapZone::ALL
            .into_iter()
            .find(|z| z.as_str() == s)
            .ok_or_else(|| LayoutError::UnknownZone(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zone_names_round_trip_through_from_str() {
        for zone in SnapZone::ALL {
            assert_eq!(zone.as_str().parse::<SnapZone>().unwrap(), zone);
        }
        assert!("middle".parse::<SnapZone>().is_err());
    }

    #[test]
    fn zone_serde_matches_display() {
        let json = serde_json::to_string(&SnapZone::TopLeft).unwrap();
        assert_eq!(json, "\"top-left\"");
    }

    #[test]
    fn grid_kind_deserializes_without_dimensions() {
        let kind: LayoutKind = serde_json::from_str(r#"{"kind":"grid"}"#).unwrap();
        assert_eq!(
            kind,
            LayoutKind::Grid {
                rows: None,
                cols: None
            }
        );
        let kind: LayoutKind = serde_json::from_str(r#"{"kind":"grid","cols":3}"#).unwrap();
        assert_eq!(
            kind,
            LayoutKind::Grid {
                rows: None,
                cols: Some(3)
            }
        );
    }

    #[test]
    fn unit_kinds_deserialize() {
        let kind: LayoutKind = serde_json::from_str(r#"{"kind":"cascade"}"#).unwrap();
        assert_eq!(kind, LayoutKind::Cascade);
        assert_eq!(kind.to_string(), "cascade");
    }
}
