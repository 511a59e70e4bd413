//! X11 display driven through `xrandr`, `xwininfo`, `xdotool` and
//! ImageMagick `import`.

mod parse;

use appshare_common::{DisplayError, Rect, ScreenSize, WindowId, WindowInfo};
use async_trait::async_trait;
use std::collections::HashSet;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::adapter::{DisplayAdapter, RawFrame};
use crate::input::{InputAction, KeyAction, PointerAction};
use crate::Result;

/// Tools the adapter shells out to.
pub const REQUIRED_TOOLS: &[&str] = &["xrandr", "xwininfo", "xdotool", "import"];

const TOOL_TIMEOUT: Duration = Duration::from_secs(5);

pub struct X11Display {
    display: String,
    timeout: Duration,
}

impl X11Display {
    pub fn new(display: impl Into<String>) -> Self {
        Self {
            display: display.into(),
            timeout: TOOL_TIMEOUT,
        }
    }

    pub fn display(&self) -> &str {
        &self.display
    }

    async fn run_raw(&self, tool: &str, args: &[String]) -> Result<Vec<u8>> {
        let output = Command::new(tool)
            .args(args)
            .env("DISPLAY", &self.display)
            .kill_on_drop(true)
            .output();
        let output = tokio::time::timeout(self.timeout, output)
            .await
            .map_err(|_| DisplayError::ToolFailed(format!("{tool} timed out")))?
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    DisplayError::Unavailable(format!("{tool} is not installed"))
                }
                _ => DisplayError::Io(e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DisplayError::ToolFailed(format!(
                "{tool} {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        Ok(output.stdout)
    }

    async fn run(&self, tool: &str, args: &[String]) -> Result<String> {
        let stdout = self.run_raw(tool, args).await?;
        Ok(String::from_utf8_lossy(&stdout).into_owned())
    }

    async fn xdotool(&self, args: Vec<String>) -> Result<String> {
        self.run("xdotool", &args).await
    }

    async fn visible_ids(&self) -> Result<HashSet<WindowId>> {
        // xdotool exits 1 when nothing matches.
        let out = match self
            .xdotool(args(["search", "--onlyvisible", "--name", "."]))
            .await
        {
            Ok(out) => out,
            Err(DisplayError::ToolFailed(_)) => String::new(),
            Err(e) => return Err(e),
        };
        Ok(out.lines().filter_map(parse::parse_window_id).collect())
    }

    async fn window_pid(&self, id: WindowId) -> Option<u32> {
        let out = self
            .xdotool(args(["getwindowpid".to_string(), id.0.to_string()]))
            .await
            .ok()?;
        out.trim().parse().ok()
    }
}

fn args<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    items.into_iter().map(Into::into).collect()
}

#[async_trait]
impl DisplayAdapter for X11Display {
    async fn screen_size(&self) -> Result<ScreenSize> {
        let out = self.run("xrandr", &args(["--query"])).await?;
        parse::parse_xrandr(&out).ok_or_else(|| {
            DisplayError::Unavailable(format!("could not read screen size of {}", self.display))
        })
    }

    async fn capture_region(&self, region: Rect) -> Result<RawFrame> {
        let bytes = self
            .run_raw(
                "import",
                &args([
                    "-window".to_string(),
                    "root".to_string(),
                    "-crop".to_string(),
                    region.to_string(),
                    "+repage".to_string(),
                    "ppm:-".to_string(),
                ]),
            )
            .await
            .map_err(|e| DisplayError::CaptureFailed(e.to_string()))?;

        let image = image::load_from_memory_with_format(&bytes, image::ImageFormat::Pnm)
            .map_err(|e| DisplayError::CaptureFailed(format!("decode: {e}")))?
            .to_rgb8();
        let (width, height) = image.dimensions();
        RawFrame::new(width, height, image.into_raw())
            .ok_or_else(|| DisplayError::CaptureFailed("frame size mismatch".into()))
    }

    async fn query_windows(&self) -> Result<Vec<WindowInfo>> {
        let tree = self
            .run("xwininfo", &args(["-root", "-children"]))
            .await
            .map_err(|e| DisplayError::WindowManager(e.to_string()))?;
        let children = parse::parse_xwininfo_children(&tree);
        let visible = self.visible_ids().await?;
        let active = self
            .xdotool(args(["getactivewindow"]))
            .await
            .ok()
            .and_then(|s| parse::parse_window_id(&s));

        let mut windows = Vec::with_capacity(children.len());
        for (z, child) in children.into_iter().enumerate() {
            let minimized = !visible.contains(&child.id);
            let pid = if minimized {
                None
            } else {
                self.window_pid(child.id).await
            };
            windows.push(WindowInfo {
                id: child.id,
                pid,
                instance_id: None,
                title: child.title,
                geometry: child.geometry,
                z_order: z as u32,
                focused: active == Some(child.id),
                minimized,
                created: child.id.0,
            });
        }
        debug!(count = windows.len(), display = %self.display, "queried windows");
        Ok(windows)
    }

    async fn set_window_geometry(&self, window: WindowId, rect: Rect) -> Result<()> {
        let id = window.0.to_string();
        self.xdotool(args([
            "windowsize".to_string(),
            "--sync".to_string(),
            id.clone(),
            rect.width.to_string(),
            rect.height.to_string(),
        ]))
        .await?;
        self.xdotool(args([
            "windowmove".to_string(),
            "--sync".to_string(),
            id,
            rect.x.to_string(),
            rect.y.to_string(),
        ]))
        .await?;
        Ok(())
    }

    async fn focus_window(&self, window: WindowId) -> Result<()> {
        self.xdotool(args([
            "windowactivate".to_string(),
            "--sync".to_string(),
            window.0.to_string(),
        ]))
        .await
        .map(|_| ())
    }

    async fn minimize_window(&self, window: WindowId) -> Result<()> {
        self.xdotool(args(["windowminimize".to_string(), window.0.to_string()]))
            .await
            .map(|_| ())
    }

    async fn close_window(&self, window: WindowId) -> Result<()> {
        self.xdotool(args(["windowclose".to_string(), window.0.to_string()]))
            .await
            .map(|_| ())
    }

    async fn inject_input(&self, action: &InputAction) -> Result<()> {
        action.validate()?;
        let commands = xdotool_commands(action);
        for cmd in commands {
            self.xdotool(cmd).await.map_err(|e| {
                warn!(display = %self.display, "input injection failed: {e}");
                DisplayError::InjectFailed(e.to_string())
            })?;
        }
        Ok(())
    }
}

/// xdotool invocations for one action, in order.
fn xdotool_commands(action: &InputAction) -> Vec<Vec<String>> {
    let mv = |x: i32, y: i32| args(["mousemove".to_string(), x.to_string(), y.to_string()]);
    match action {
        InputAction::Pointer {
            x,
            y,
            action,
            button,
        } => {
            let b = button.code().to_string();
            let second = match action {
                PointerAction::Move => None,
                PointerAction::Down => Some(args(["mousedown".to_string(), b])),
                PointerAction::Up => Some(args(["mouseup".to_string(), b])),
                PointerAction::Click => Some(args(["click".to_string(), b])),
            };
            std::iter::once(mv(*x, *y)).chain(second).collect()
        }
        InputAction::Key {
            key,
            modifiers,
            action,
        } => {
            let verb = match action {
                KeyAction::Press => "key",
                KeyAction::Down => "keydown",
                KeyAction::Up => "keyup",
            };
            vec![args([
                verb.to_string(),
                "--clearmodifiers".to_string(),
                InputAction::key_chord(key, modifiers),
            ])]
        }
        InputAction::Scroll {
            x,
            y,
            direction,
            amount,
        } => vec![
            mv(*x, *y),
            args([
                "click".to_string(),
                "--repeat".to_string(),
                amount.to_string(),
                direction.button().to_string(),
            ]),
        ],
    }
}
