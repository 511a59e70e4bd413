//! Parsers for the text output of `xrandr`, `xwininfo` and `xdotool`.

use appshare_common::{Rect, ScreenSize, WindowId};

/// One line of `xwininfo -root -children`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ChildWindow {
    pub id: WindowId,
    pub title: String,
    pub geometry: Rect,
}

/// Parse `WxH+X+Y`. Offsets may be negative, written either `-10` or
/// `+-10` as xwininfo does for off-screen windows.
pub(crate) fn parse_geometry(s: &str) -> Option<Rect> {
    let (w, rest) = s.split_once('x')?;
    let split = rest.find(['+', '-'])?;
    let (h, offsets) = rest.split_at(split);
    let body = &offsets[1..];
    let second = 1 + 1 + body.get(1..)?.find(['+', '-'])?;
    let (x, y) = offsets.split_at(second);
    Some(Rect::new(
        parse_offset(x)?,
        parse_offset(y)?,
        w.parse().ok()?,
        h.parse().ok()?,
    ))
}

fn parse_offset(s: &str) -> Option<i32> {
    let (sign, digits) = s.split_at(1);
    let value: i32 = digits.parse().ok()?;
    match sign {
        "+" => Some(value),
        "-" => Some(-value),
        _ => None,
    }
}

/// Screen size from `xrandr --query`: the `current W x H` of the first
/// screen, or failing that the mode of the primary connected output.
pub(crate) fn parse_xrandr(output: &str) -> Option<ScreenSize> {
    for line in output.lines() {
        if let Some(idx) = line.find("current ") {
            let mut parts = line[idx + "current ".len()..].split_whitespace();
            let w = parts.next()?.parse().ok()?;
            let _x = parts.next()?;
            let h = parts.next()?.trim_end_matches(',').parse().ok()?;
            return Some(ScreenSize::new(w, h));
        }
    }
    output
        .lines()
        .filter(|l| l.contains(" connected"))
        .find_map(|l| {
            l.split_whitespace()
                .find_map(parse_geometry)
                .map(|r| ScreenSize::new(r.width, r.height))
        })
}

/// Parse a window id as printed by X tools, hex (`0x1a00003`) or decimal.
pub(crate) fn parse_window_id(s: &str) -> Option<WindowId> {
    let s = s.trim();
    match s.strip_prefix("0x") {
        Some(hex) => u64::from_str_radix(hex, 16).ok().map(WindowId),
        None => s.parse().ok().map(WindowId),
    }
}

/// Top-level children of the root window, bottom of the stack first.
pub(crate) fn parse_xwininfo_children(output: &str) -> Vec<ChildWindow> {
    output.lines().filter_map(parse_child_line).collect()
}

fn parse_child_line(line: &str) -> Option<ChildWindow> {
    let line = line.trim_start();
    if !line.starts_with("0x") {
        return None;
    }
    let (id_str, rest) = line.split_once(' ')?;
    let id = parse_window_id(id_str)?;

    let title = if rest.starts_with("(has no name)") {
        String::new()
    } else {
        let start = rest.find('"')? + 1;
        let end = start + rest[start..].find("\":")?;
        rest[start..end].to_string()
    };

    // The first geometry token after the title/class block.
    let after = rest.rsplit_once(')').map(|(_, g)| g).unwrap_or(rest);
    let geometry = after.split_whitespace().find_map(parse_geometry)?;
    Some(ChildWindow {
        id,
        title,
        geometry,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geometry_with_positive_and_negative_offsets() {
        assert_eq!(parse_geometry("1280x720+0+0"), Some(Rect::new(0, 0, 1280, 720)));
        assert_eq!(parse_geometry("640x480-10+5"), Some(Rect::new(-10, 5, 640, 480)));
        assert_eq!(parse_geometry("640x480+3-7"), Some(Rect::new(3, -7, 640, 480)));
        assert_eq!(parse_geometry("1x1+-1+-1"), Some(Rect::new(-1, -1, 1, 1)));
        assert_eq!(parse_geometry("nonsense"), None);
    }

    #[test]
    fn xrandr_current_size() {
        let out = "Screen 0: minimum 8 x 8, current 2560 x 1440, maximum 32767 x 32767\n\
                   HDMI-1 connected primary 2560x1440+0+0 (normal left inverted) 597mm x 336mm\n";
        assert_eq!(parse_xrandr(out), Some(ScreenSize::new(2560, 1440)));
    }

    #[test]
    fn xrandr_falls_back_to_connected_output() {
        let out = "eDP-1 connected primary 1920x1080+0+0 (normal) 344mm x 194mm\n";
        assert_eq!(parse_xrandr(out), Some(ScreenSize::new(1920, 1080)));
        assert_eq!(parse_xrandr("no outputs"), None);
    }

    #[test]
    fn window_ids_in_both_bases() {
        assert_eq!(parse_window_id("0x1a00003"), Some(WindowId(0x1a00003)));
        assert_eq!(parse_window_id("27262979\n"), Some(WindowId(27262979)));
        assert_eq!(parse_window_id("zz"), None);
    }

    #[test]
    fn xwininfo_children_listing() {
        let out = r#"
xwininfo: Window id: 0x1e5 (the root window) (has no name)

  Root window id: 0x1e5 (the root window) (has no name)
  Parent window id: 0x0 (none)
     3 children:
     0x1000001 (has no name): ()  1x1+-1+-1  +-1+-1
     0x1a00003 "Mozilla Firefox": ("Navigator" "firefox")  1280x720+10+20  +10+20
     0x2200007 "notes.txt (~) - gedit": ("gedit" "Gedit")  800x600+0+0  +0+0
"#;
        let children = parse_xwininfo_children(out);
        assert_eq!(children.len(), 3);
        assert_eq!(children[0].title, "");
        assert_eq!(children[1].id, WindowId(0x1a00003));
        assert_eq!(children[1].title, "Mozilla Firefox");
        assert_eq!(children[1].geometry, Rect::new(10, 20, 1280, 720));
        assert_eq!(children[2].title, "notes.txt (~) - gedit");
        assert_eq!(children[2].geometry, Rect::new(0, 0, 800, 600));
    }
}
