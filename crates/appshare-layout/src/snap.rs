//! Snap zone rectangles.

use appshare_common::{Rect, ScreenSize};

use crate::kind::SnapZone;
use crate::types::LayoutEngine;
use crate::Result;

impl LayoutEngine {
    /// Rectangle a window snapped to `zone` occupies. Opposite halves meet
    /// exactly, so odd dimensions give the extra pixel to the right/bottom.
    pub fn snap_rect(&self, zone: SnapZone, screen: ScreenSize) -> Result<Rect> {
        let area = self.usable_area(screen)?;
        let half_w = area.width / 2;
        let half_h = area.height / 2;
        let mid_x = area.x + half_w as i32;
        let mid_y = area.y + half_h as i32;
        let rest_w = area.width - half_w;
        let rest_h = area.height - half_h;

        let rect = match zone {
            SnapZone::Left => Rect::new(area.x, area.y, half_w, area.height),
            SnapZone::Right => Rect::new(mid_x, area.y, rest_w, area.height),
            SnapZone::Top => Rect::new(area.x, area.y, area.width, half_h),
            SnapZone::Bottom => Rect::new(area.x, mid_y, area.width, rest_h),
            SnapZone::TopLeft => Rect::new(area.x, area.y, half_w, half_h),
            SnapZone::TopRight => Rect::new(mid_x, area.y, rest_w, half_h),
            SnapZone::BottomLeft => Rect::new(area.x, mid_y, half_w, rest_h),
            SnapZone::BottomRight => Rect::new(mid_x, mid_y, rest_w, rest_h),
        };
        Ok(rect)
    }
}
