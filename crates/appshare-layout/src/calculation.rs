//! Rectangle computation for each layout kind.

use appshare_common::{Rect, ScreenSize, WindowInfo};

use crate::kind::LayoutKind;
use crate::types::{LayoutEngine, Placement};
use crate::{LayoutError, Result};

/// Split `len` pixels starting at `start` into `n` spans separated by `gap`
/// and return span `i`. Boundaries sit at `floor(i * usable / n)` so the
/// spans always add up to the usable length exactly.
pub(crate) fn partition(start: i32, len: u32, n: u32, gap: u32, i: u32) -> (i32, u32) {
    debug_assert!(n > 0 && i < n);
    let gaps = gap as u64 * (n as u64 - 1);
    let usable = (len as u64).saturating_sub(gaps);
    let a = i as u64 * usable / n as u64;
    let b = (i as u64 + 1) * usable / n as u64;
    let offset = start as i64 + a as i64 + i as i64 * gap as i64;
    (offset as i32, (b - a) as u32)
}

fn ceil_div(a: u32, b: u32) -> u32 {
    a.div_ceil(b)
}

fn ceil_sqrt(k: u32) -> u32 {
    let mut c = 1;
    while c * c < k {
        c += 1;
    }
    c
}

impl LayoutEngine {
    /// Screen bounds minus the outer margin.
    pub fn usable_area(&self, screen: ScreenSize) -> Result<Rect> {
        let area = screen.bounds().inset(self.outer_margin);
        if area.is_empty() {
            return Err(LayoutError::EmptyArea);
        }
        Ok(area)
    }

    /// Windows that take part in a layout, in assignment order.
    pub fn ordered<'a>(&self, windows: &'a [WindowInfo]) -> Vec<&'a WindowInfo> {
        let mut out: Vec<&WindowInfo> = windows.iter().filter(|w| w.is_layoutable()).collect();
        out.sort_by_key(|w| (w.created, w.id));
        out
    }

    /// Compute target rectangles for `kind`. Windows absent from the result
    /// keep their current geometry.
    pub fn compute(
        &self,
        kind: LayoutKind,
        screen: ScreenSize,
        windows: &[WindowInfo],
    ) -> Result<Vec<Placement>> {
        if let LayoutKind::Grid { rows, cols } = kind {
            if rows == Some(0) || cols == Some(0) {
                return Err(LayoutError::InvalidGrid {
                    rows: rows.unwrap_or(0),
                    cols: cols.unwrap_or(0),
                });
            }
        }

        let area = self.usable_area(screen)?;
        let ordered = self.ordered(windows);
        if ordered.is_empty() {
            return Ok(Vec::new());
        }

        let placements = match kind {
            LayoutKind::Tiled => self.tiled(area, &ordered),
            LayoutKind::Cascade => self.cascade(area, &ordered),
            LayoutKind::Grid { rows, cols } => self.grid(area, &ordered, rows, cols),
            LayoutKind::Maximize => Self::maximize(area, &ordered),
        };
        Ok(placements)
    }

    /// Number of rows for `k` tiled windows: the count whose worst cell is
    /// closest in aspect to the area itself. Ties keep fewer rows.
    pub(crate) fn tiled_rows(&self, area: Rect, k: u32) -> u32 {
        let area_aspect = area.width as f64 / area.height as f64;
        let gap = self.gap as f64;
        let cell_distortion = |rows: u32, cols: u32| {
            let w = (area.width as f64 - gap * (cols as f64 - 1.0)).max(1.0) / cols as f64;
            let h = (area.height as f64 - gap * (rows as f64 - 1.0)).max(1.0) / rows as f64;
            ((w / h) / area_aspect).ln().abs()
        };

        let mut best = (1, f64::INFINITY);
        for rows in 1..=k {
            let base = k / rows;
            let extra = k % rows;
            let mut worst = cell_distortion(rows, base);
            if extra > 0 {
                worst = worst.max(cell_distortion(rows, base + 1));
            }
            if worst < best.1 - 1e-9 {
                best = (rows, worst);
            }
        }
        best.0
    }

    fn tiled(&self, area: Rect, windows: &[&WindowInfo]) -> Vec<Placement> {
        let k = windows.len() as u32;
        let rows = self.tiled_rows(area, k);
        let base = k / rows;
        let extra = k % rows;

        let mut out = Vec::with_capacity(windows.len());
        let mut iter = windows.iter();
        for row in 0..rows {
            let count = base + u32::from(row < extra);
            let (y, height) = partition(area.y, area.height, rows, self.gap, row);
            for col in 0..count {
                let Some(window) = iter.next() else { break };
                let (x, width) = partition(area.x, area.width, count, self.gap, col);
                out.push(Placement::new(window.id, Rect::new(x, y, width, height)));
            }
        }
        out
    }

    fn grid(
        &self,
        area: Rect,
        windows: &[&WindowInfo],
        rows: Option<u32>,
        cols: Option<u32>,
    ) -> Vec<Placement> {
        let k = windows.len() as u32;
        let (rows, cols) = match (rows, cols) {
            (r, Some(c)) => (r.unwrap_or(0).max(ceil_div(k, c)), c),
            (Some(r), None) => (r, ceil_div(k, r)),
            (None, None) => {
                let c = ceil_sqrt(k);
                (ceil_div(k, c), c)
            }
        };

        let right = area.right();
        windows
            .iter()
            .enumerate()
            .map(|(i, window)| {
                let i = i as u32;
                let (row, col) = (i / cols, i % cols);
                let (y, height) = partition(area.y, area.height, rows, self.gap, row);
                let (x, mut width) = partition(area.x, area.width, cols, self.gap, col);
                if i == k - 1 {
                    width = (right - x as i64) as u32;
                }
                Placement::new(window.id, Rect::new(x, y, width, height))
            })
            .collect()
    }

    fn cascade(&self, area: Rect, windows: &[&WindowInfo]) -> Vec<Placement> {
        let width = ((area.width as f64 * self.cascade_scale) as u32).clamp(1, area.width);
        let height = ((area.height as f64 * self.cascade_scale) as u32).clamp(1, area.height);
        let max_x = area.right() - width as i64;
        let max_y = area.bottom() - height as i64;

        windows
            .iter()
            .enumerate()
            .map(|(i, window)| {
                let offset = i as i64 * self.cascade_step as i64;
                let x = (area.x as i64 + offset).min(max_x);
                let y = (area.y as i64 + offset).min(max_y);
                Placement::new(window.id, Rect::new(x as i32, y as i32, width, height))
            })
            .collect()
    }

    /// The focused window, or failing that the topmost one, fills the area.
    fn maximize(area: Rect, windows: &[&WindowInfo]) -> Vec<Placement> {
        let target = windows
            .iter()
            .find(|w| w.focused)
            .or_else(|| windows.iter().max_by_key(|w| (w.z_order, w.created)));
        target
            .map(|w| vec![Placement::new(w.id, area)])
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_covers_odd_lengths_exactly() {
        let spans: Vec<_> = (0..3).map(|i| partition(0, 1001, 3, 0, i)).collect();
        assert_eq!(spans, vec![(0, 333), (333, 334), (667, 334)]);
    }

    #[test]
    fn partition_leaves_gaps_between_spans() {
        let (x0, w0) = partition(10, 810, 2, 10, 0);
        let (x1, w1) = partition(10, 810, 2, 10, 1);
        assert_eq!((x0, w0), (10, 400));
        assert_eq!((x1, w1), (420, 400));
    }

    #[test]
    fn ceil_sqrt_values() {
        assert_eq!(ceil_sqrt(1), 1);
        assert_eq!(ceil_sqrt(4), 2);
        assert_eq!(ceil_sqrt(5), 3);
        assert_eq!(ceil_sqrt(10), 4);
    }

    #[test]
    fn tiled_rows_prefers_square_cells() {
        let engine = LayoutEngine::default();
        let area = Rect::new(0, 0, 1920, 1080);
        assert_eq!(engine.tiled_rows(area, 1), 1);
        assert_eq!(engine.tiled_rows(area, 2), 1);
        assert_eq!(engine.tiled_rows(area, 3), 2);
        assert_eq!(engine.tiled_rows(area, 4), 2);
        assert_eq!(engine.tiled_rows(area, 9), 3);
    }
}
