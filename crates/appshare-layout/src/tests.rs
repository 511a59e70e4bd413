//! Layout engine behaviour across kinds.

use super::*;
use appshare_common::{Rect, ScreenSize, WindowId, WindowInfo};

fn windows(n: u64) -> Vec<WindowInfo> {
    (1..=n)
        .map(|i| WindowInfo::new(WindowId(i), Rect::new(0, 0, 300, 200)))
        .collect()
}

fn assert_partition(placements: &[Placement], area: Rect) {
    for (i, a) in placements.iter().enumerate() {
        assert!(!a.rect.is_empty(), "{} is empty", a.rect);
        assert!(
            a.rect.x as i64 >= area.x as i64
                && a.rect.y as i64 >= area.y as i64
                && a.rect.right() <= area.right()
                && a.rect.bottom() <= area.bottom(),
            "{} escapes {}",
            a.rect,
            area
        );
        for b in &placements[i + 1..] {
            assert!(!a.rect.overlaps(&b.rect), "{} overlaps {}", a.rect, b.rect);
        }
    }
    let covered: u64 = placements.iter().map(|p| p.rect.area()).sum();
    assert_eq!(covered, area.area());
}

#[test]
fn four_windows_tile_into_quadrants() {
    let engine = LayoutEngine::default();
    let screen = ScreenSize::new(1920, 1080);
    let result = engine.compute(LayoutKind::Tiled, screen, &windows(4)).unwrap();

    let rects: Vec<Rect> = result.iter().map(|p| p.rect).collect();
    assert_eq!(
        rects,
        vec![
            Rect::new(0, 0, 960, 540),
            Rect::new(960, 0, 960, 540),
            Rect::new(0, 540, 960, 540),
            Rect::new(960, 540, 960, 540),
        ]
    );
}

#[test]
fn tiled_and_grid_partition_the_screen() {
    let engine = LayoutEngine::default();
    for screen in [
        ScreenSize::new(1920, 1080),
        ScreenSize::new(1366, 768),
        ScreenSize::new(1001, 777),
    ] {
        for k in 1..=13 {
            let ws = windows(k);
            let grid = LayoutKind::Grid {
                rows: None,
                cols: None,
            };
            for kind in [LayoutKind::Tiled, grid] {
                let result = engine.compute(kind, screen, &ws).unwrap();
                assert_eq!(result.len(), k as usize, "{kind} with {k} windows");
                assert_partition(&result, screen.bounds());
            }
        }
    }
}

#[test]
fn reapplying_a_layout_is_idempotent() {
    let engine = LayoutEngine::default();
    let screen = ScreenSize::new(1600, 900);
    let mut ws = windows(5);
    let first = engine.compute(LayoutKind::Tiled, screen, &ws).unwrap();

    for (w, p) in ws.iter_mut().zip(&first) {
        w.geometry = p.rect;
    }
    let second = engine.compute(LayoutKind::Tiled, screen, &ws).unwrap();
    assert_eq!(first, second);
}

#[test]
fn assignment_follows_creation_order() {
    let engine = LayoutEngine::default();
    let mut ws = windows(2);
    ws[0].created = 20;
    ws[1].created = 10;
    let result = engine
        .compute(LayoutKind::Tiled, ScreenSize::new(1000, 500), &ws)
        .unwrap();
    assert_eq!(result[0].window, WindowId(2));
    assert_eq!(result[0].rect.x, 0);
    assert_eq!(result[1].window, WindowId(1));
}

#[test]
fn three_tiled_windows_use_two_rows() {
    let engine = LayoutEngine::default();
    let result = engine
        .compute(LayoutKind::Tiled, ScreenSize::new(1920, 1080), &windows(3))
        .unwrap();
    assert_eq!(result[0].rect, Rect::new(0, 0, 960, 540));
    assert_eq!(result[1].rect, Rect::new(960, 0, 960, 540));
    assert_eq!(result[2].rect, Rect::new(0, 540, 1920, 540));
}

#[test]
fn grid_last_window_spans_partial_row() {
    let engine = LayoutEngine::default();
    let result = engine
        .compute(
            LayoutKind::Grid {
                rows: None,
                cols: None,
            },
            ScreenSize::new(1800, 900),
            &windows(5),
        )
        .unwrap();
    // 3 columns, 2 rows; the fifth window covers columns 2 and 3.
    assert_eq!(result[3].rect, Rect::new(0, 450, 600, 450));
    assert_eq!(result[4].rect, Rect::new(600, 450, 1200, 450));

    let result = engine
        .compute(
            LayoutKind::Grid {
                rows: None,
                cols: None,
            },
            ScreenSize::new(1800, 900),
            &windows(4),
        )
        .unwrap();
    assert_eq!(result[3].rect, Rect::new(900, 450, 900, 450));
}

#[test]
fn grid_rows_grow_to_fit_windows() {
    let engine = LayoutEngine::default();
    let kind = LayoutKind::Grid {
        rows: Some(1),
        cols: Some(2),
    };
    let result = engine
        .compute(kind, ScreenSize::new(1000, 900), &windows(5))
        .unwrap();
    assert_eq!(result.len(), 5);
    assert_eq!(result[0].rect, Rect::new(0, 0, 500, 300));
    assert_eq!(result[4].rect, Rect::new(0, 600, 1000, 300));
    assert_partition(&result, Rect::new(0, 0, 1000, 900));
}

#[test]
fn grid_with_only_rows_derives_columns() {
    let engine = LayoutEngine::default();
    let kind = LayoutKind::Grid {
        rows: Some(1),
        cols: None,
    };
    let result = engine
        .compute(kind, ScreenSize::new(900, 300), &windows(3))
        .unwrap();
    let widths: Vec<u32> = result.iter().map(|p| p.rect.width).collect();
    assert_eq!(widths, vec![300, 300, 300]);
}

#[test]
fn zero_grid_dimension_is_rejected() {
    let engine = LayoutEngine::default();
    let kind = LayoutKind::Grid {
        rows: Some(0),
        cols: Some(2),
    };
    let err = engine
        .compute(kind, ScreenSize::new(800, 600), &windows(2))
        .unwrap_err();
    assert_eq!(err, LayoutError::InvalidGrid { rows: 0, cols: 2 });
}

#[test]
fn gap_and_margin_shrink_cells() {
    let engine = LayoutEngine {
        gap: 10,
        outer_margin: 20,
        ..LayoutEngine::default()
    };
    let result = engine
        .compute(LayoutKind::Tiled, ScreenSize::new(1040, 540), &windows(2))
        .unwrap();
    assert_eq!(result[0].rect, Rect::new(20, 20, 495, 500));
    assert_eq!(result[1].rect, Rect::new(525, 20, 495, 500));
    assert!(!result[0].rect.overlaps(&result[1].rect));
}

#[test]
fn margin_larger_than_screen_is_an_error() {
    let engine = LayoutEngine {
        outer_margin: 500,
        ..LayoutEngine::default()
    };
    let err = engine
        .compute(LayoutKind::Tiled, ScreenSize::new(800, 600), &windows(1))
        .unwrap_err();
    assert_eq!(err, LayoutError::EmptyArea);
}

#[test]
fn cascade_offsets_and_clips() {
    let engine = LayoutEngine::default();
    let screen = ScreenSize::new(200, 100);
    let result = engine.compute(LayoutKind::Cascade, screen, &windows(3)).unwrap();
    assert_eq!(result[0].rect, Rect::new(0, 0, 100, 50));
    assert_eq!(result[1].rect, Rect::new(30, 30, 100, 50));
    // Third window would start at y=60 and overflow; it is pulled back in.
    assert_eq!(result[2].rect, Rect::new(60, 50, 100, 50));
}

#[test]
fn maximize_targets_focused_window_only() {
    let engine = LayoutEngine::default();
    let mut ws = windows(3);
    ws[1].focused = true;
    let result = engine
        .compute(LayoutKind::Maximize, ScreenSize::new(1280, 720), &ws)
        .unwrap();
    assert_eq!(
        result,
        vec![Placement::new(WindowId(2), Rect::new(0, 0, 1280, 720))]
    );
}

#[test]
fn maximize_without_focus_picks_topmost() {
    let engine = LayoutEngine::default();
    let mut ws = windows(3);
    ws[0].z_order = 5;
    let result = engine
        .compute(LayoutKind::Maximize, ScreenSize::new(1280, 720), &ws)
        .unwrap();
    assert_eq!(result[0].window, WindowId(1));
}

#[test]
fn minimized_and_zero_sized_windows_are_skipped() {
    let engine = LayoutEngine::default();
    let mut ws = windows(4);
    ws[1].minimized = true;
    ws[2].geometry = Rect::new(0, 0, 0, 0);
    let result = engine
        .compute(LayoutKind::Tiled, ScreenSize::new(1000, 500), &ws)
        .unwrap();
    let ids: Vec<WindowId> = result.iter().map(|p| p.window).collect();
    assert_eq!(ids, vec![WindowId(1), WindowId(4)]);
}

#[test]
fn empty_window_list_gives_empty_layout() {
    let engine = LayoutEngine::default();
    let result = engine
        .compute(LayoutKind::Tiled, ScreenSize::new(1000, 500), &[])
        .unwrap();
    assert!(result.is_empty());
}

#[test]
fn snap_halves_meet_exactly() {
    let engine = LayoutEngine::default();
    let screen = ScreenSize::new(1921, 1081);
    let left = engine.snap_rect(SnapZone::Left, screen).unwrap();
    let right = engine.snap_rect(SnapZone::Right, screen).unwrap();
    assert_eq!(left, Rect::new(0, 0, 960, 1081));
    assert_eq!(right, Rect::new(960, 0, 961, 1081));
    assert!(!left.overlaps(&right));
}

#[test]
fn snap_quarters_partition_the_screen() {
    let engine = LayoutEngine::default();
    let screen = ScreenSize::new(1920, 1080);
    let quarters: Vec<Placement> = [
        SnapZone::TopLeft,
        SnapZone::TopRight,
        SnapZone::BottomLeft,
        SnapZone::BottomRight,
    ]
    .into_iter()
    .enumerate()
    .map(|(i, z)| Placement::new(WindowId(i as u64), engine.snap_rect(z, screen).unwrap()))
    .collect();
    assert_partition(&quarters, screen.bounds());
}

#[test]
fn snap_respects_outer_margin() {
    let engine = LayoutEngine {
        outer_margin: 10,
        ..LayoutEngine::default()
    };
    let top = engine
        .snap_rect(SnapZone::Top, ScreenSize::new(1020, 620))
        .unwrap();
    assert_eq!(top, Rect::new(10, 10, 1000, 300));
}
