//! In-memory display and process host.
//!
//! Used by the engine's tests and by the server's `--headless` mode. The
//! virtual host pairs with the virtual display: spawning a program opens a
//! window for its pid, and a process that exits takes its windows with it.

use appshare_common::{DisplayError, Rect, ScreenSize, WindowId, WindowInfo};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::adapter::{DisplayAdapter, RawFrame};
use crate::input::InputAction;
use crate::process::{LaunchSpec, ProbeReport, ProcessHandle, ProcessHost};
use crate::Result;

#[derive(Default)]
struct DisplayState {
    windows: Vec<WindowInfo>,
    injected: Vec<InputAction>,
    geometry_calls: Vec<(WindowId, Rect)>,
    failing_captures: u32,
    capture_always_fails: bool,
    churn_queries: u32,
}

/// A display that exists only in memory.
pub struct VirtualDisplay {
    screen: ScreenSize,
    state: Mutex<DisplayState>,
    next_window: AtomicU64,
    frames: AtomicU64,
}

impl VirtualDisplay {
    pub fn new(screen: ScreenSize) -> Self {
        Self {
            screen,
            state: Mutex::new(DisplayState::default()),
            next_window: AtomicU64::new(1),
            frames: AtomicU64::new(0),
        }
    }

    /// Map a new window and give it focus.
    pub async fn open_window(&self, pid: Option<u32>, title: &str, geometry: Rect) -> WindowId {
        let id = WindowId(self.next_window.fetch_add(1, Ordering::SeqCst));
        let mut state = self.state.lock().await;
        let top = state.windows.iter().map(|w| w.z_order).max().unwrap_or(0);
        for w in &mut state.windows {
            w.focused = false;
        }
        state.windows.push(WindowInfo {
            id,
            pid,
            instance_id: None,
            title: title.to_string(),
            geometry,
            z_order: top + 1,
            focused: true,
            minimized: false,
            created: id.0,
        });
        id
    }

    pub async fn close_windows_of(&self, pid: u32) {
        self.state
            .lock()
            .await
            .windows
            .retain(|w| w.pid != Some(pid));
    }

    pub async fn set_minimized(&self, id: WindowId, minimized: bool) {
        if let Some(w) = self
            .state
            .lock()
            .await
            .windows
            .iter_mut()
            .find(|w| w.id == id)
        {
            w.minimized = minimized;
        }
    }

    pub async fn window(&self, id: WindowId) -> Option<WindowInfo> {
        self.state
            .lock()
            .await
            .windows
            .iter()
            .find(|w| w.id == id)
            .cloned()
    }

    /// Every action injected so far, oldest first.
    pub async fn injected(&self) -> Vec<InputAction> {
        self.state.lock().await.injected.clone()
    }

    pub async fn geometry_calls(&self) -> Vec<(WindowId, Rect)> {
        self.state.lock().await.geometry_calls.clone()
    }

    /// Make the next `n` captures fail.
    pub async fn fail_next_captures(&self, n: u32) {
        self.state.lock().await.failing_captures = n;
    }

    pub async fn set_capture_failing(&self, failing: bool) {
        self.state.lock().await.capture_always_fails = failing;
    }

    /// The next `n` window queries each open one extra window first,
    /// so the window set never looks the same twice in a row.
    pub async fn churn_next_queries(&self, n: u32) {
        self.state.lock().await.churn_queries = n;
    }

    pub fn frames_captured(&self) -> u64 {
        self.frames.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DisplayAdapter for VirtualDisplay {
    async fn screen_size(&self) -> Result<ScreenSize> {
        Ok(self.screen)
    }

    async fn capture_region(&self, region: Rect) -> Result<RawFrame> {
        {
            let mut state = self.state.lock().await;
            if state.capture_always_fails {
                return Err(DisplayError::CaptureFailed("capture disabled".into()));
            }
            if state.failing_captures > 0 {
                state.failing_captures -= 1;
                return Err(DisplayError::CaptureFailed("injected failure".into()));
            }
        }
        let clipped = region
            .intersection(&self.screen.bounds())
            .ok_or_else(|| DisplayError::CaptureFailed(format!("{region} is off screen")))?;
        let n = self.frames.fetch_add(1, Ordering::SeqCst);
        let shade = (n % 256) as u8;
        Ok(RawFrame::solid(
            clipped.width,
            clipped.height,
            [shade, 128, 255 - shade],
        ))
    }

    async fn query_windows(&self) -> Result<Vec<WindowInfo>> {
        let churn = {
            let mut state = self.state.lock().await;
            let churn = state.churn_queries > 0;
            if churn {
                state.churn_queries -= 1;
            }
            churn
        };
        if churn {
            self.open_window(None, "churn", Rect::new(0, 0, 200, 200)).await;
        }
        Ok(self.state.lock().await.windows.clone())
    }

    async fn set_window_geometry(&self, window: WindowId, rect: Rect) -> Result<()> {
        let mut state = self.state.lock().await;
        let w = state
            .windows
            .iter_mut()
            .find(|w| w.id == window)
            .ok_or_else(|| DisplayError::WindowNotFound(window.to_string()))?;
        w.geometry = rect;
        state.geometry_calls.push((window, rect));
        Ok(())
    }

    async fn focus_window(&self, window: WindowId) -> Result<()> {
        let mut state = self.state.lock().await;
        if !state.windows.iter().any(|w| w.id == window) {
            return Err(DisplayError::WindowNotFound(window.to_string()));
        }
        let top = state.windows.iter().map(|w| w.z_order).max().unwrap_or(0);
        for w in &mut state.windows {
            w.focused = w.id == window;
            if w.focused {
                w.z_order = top + 1;
            }
        }
        Ok(())
    }

    async fn minimize_window(&self, window: WindowId) -> Result<()> {
        let mut state = self.state.lock().await;
        let w = state
            .windows
            .iter_mut()
            .find(|w| w.id == window)
            .ok_or_else(|| DisplayError::WindowNotFound(window.to_string()))?;
        w.minimized = true;
        w.focused = false;
        Ok(())
    }

    async fn close_window(&self, window: WindowId) -> Result<()> {
        let mut state = self.state.lock().await;
        let before = state.windows.len();
        state.windows.retain(|w| w.id != window);
        if state.windows.len() == before {
            return Err(DisplayError::WindowNotFound(window.to_string()));
        }
        Ok(())
    }

    async fn inject_input(&self, action: &InputAction) -> Result<()> {
        action.validate()?;
        self.state.lock().await.injected.push(action.clone());
        Ok(())
    }
}

/// How a virtual program behaves once spawned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProgramBehavior {
    /// Opens a window immediately and runs until signalled.
    #[default]
    Normal,
    /// Runs but never maps a window.
    Windowless,
    /// Fails to spawn.
    SpawnFails,
}

#[derive(Debug, Clone, Copy)]
struct VirtualProcess {
    alive: bool,
    memory_bytes: u64,
    cpu_percent: f64,
    ignores_term: bool,
}

#[derive(Default)]
struct HostState {
    programs: HashMap<String, ProgramBehavior>,
    processes: HashMap<u32, VirtualProcess>,
    spawned: Vec<(u32, LaunchSpec)>,
    stubborn: HashSet<String>,
    probe_errors: u32,
    window_size: Option<(u32, u32)>,
}

/// A process host whose "processes" are table entries. Paired with a
/// [`VirtualDisplay`] it opens and closes windows like real apps would.
pub struct VirtualProcessHost {
    display: Option<Arc<VirtualDisplay>>,
    state: Mutex<HostState>,
    next_pid: AtomicU32,
}

impl VirtualProcessHost {
    pub fn new(display: Option<Arc<VirtualDisplay>>) -> Self {
        Self {
            display,
            state: Mutex::new(HostState::default()),
            next_pid: AtomicU32::new(1000),
        }
    }

    /// Make `program` launchable with the given behaviour.
    pub async fn install(&self, program: &str, behavior: ProgramBehavior) {
        self.state
            .lock()
            .await
            .programs
            .insert(program.to_string(), behavior);
    }

    /// Processes of `program` ignore SIGTERM and must be killed.
    pub async fn ignore_term(&self, program: &str) {
        self.state.lock().await.stubborn.insert(program.to_string());
    }

    /// Size of windows opened by later spawns. Defaults to 800x600.
    pub async fn set_window_size(&self, width: u32, height: u32) {
        self.state.lock().await.window_size = Some((width, height));
    }

    /// Simulate an unexpected exit.
    pub async fn crash(&self, pid: u32) {
        if let Some(p) = self.state.lock().await.processes.get_mut(&pid) {
            p.alive = false;
        }
        if let Some(display) = &self.display {
            display.close_windows_of(pid).await;
        }
    }

    pub async fn set_usage(&self, pid: u32, memory_bytes: u64, cpu_percent: f64) {
        if let Some(p) = self.state.lock().await.processes.get_mut(&pid) {
            p.memory_bytes = memory_bytes;
            p.cpu_percent = cpu_percent;
        }
    }

    /// Make the next `n` probes return an error.
    pub async fn fail_next_probes(&self, n: u32) {
        self.state.lock().await.probe_errors = n;
    }

    pub async fn is_alive(&self, pid: u32) -> bool {
        self.state
            .lock()
            .await
            .processes
            .get(&pid)
            .map(|p| p.alive)
            .unwrap_or(false)
    }

    pub async fn alive_count(&self) -> usize {
        self.state
            .lock()
            .await
            .processes
            .values()
            .filter(|p| p.alive)
            .count()
    }

    /// Every spawn so far as `(pid, spec)`, oldest first.
    pub async fn spawned(&self) -> Vec<(u32, LaunchSpec)> {
        self.state.lock().await.spawned.clone()
    }

    async fn exit(&self, pid: u32) {
        if let Some(p) = self.state.lock().await.processes.get_mut(&pid) {
            p.alive = false;
        }
        if let Some(display) = &self.display {
            display.close_windows_of(pid).await;
        }
    }
}

#[async_trait]
impl ProcessHost for VirtualProcessHost {
    async fn spawn(&self, spec: &LaunchSpec) -> Result<ProcessHandle> {
        let (behavior, ignores_term, (width, height)) = {
            let state = self.state.lock().await;
            let behavior = state.programs.get(&spec.program).copied().ok_or_else(|| {
                DisplayError::SpawnFailed(format!("{} not found on PATH", spec.program))
            })?;
            (
                behavior,
                state.stubborn.contains(&spec.program),
                state.window_size.unwrap_or((800, 600)),
            )
        };
        if behavior == ProgramBehavior::SpawnFails {
            return Err(DisplayError::SpawnFailed(format!(
                "{} failed to start",
                spec.program
            )));
        }

        let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
        {
            let mut state = self.state.lock().await;
            state.processes.insert(
                pid,
                VirtualProcess {
                    alive: true,
                    memory_bytes: 64 * 1024 * 1024,
                    cpu_percent: 1.0,
                    ignores_term,
                },
            );
            state.spawned.push((pid, spec.clone()));
        }

        if behavior == ProgramBehavior::Normal {
            if let Some(display) = &self.display {
                display
                    .open_window(Some(pid), &spec.program, Rect::new(0, 0, width, height))
                    .await;
            }
        }
        debug!(pid, program = %spec.program, "virtual spawn");
        Ok(ProcessHandle { pid })
    }

    async fn probe(&self, handle: ProcessHandle) -> Result<ProbeReport> {
        let mut state = self.state.lock().await;
        if state.probe_errors > 0 {
            state.probe_errors -= 1;
            return Err(DisplayError::ToolFailed("probe unavailable".into()));
        }
        Ok(match state.processes.get(&handle.pid) {
            Some(p) if p.alive => ProbeReport {
                alive: true,
                memory_bytes: p.memory_bytes,
                cpu_percent: p.cpu_percent,
            },
            _ => ProbeReport::dead(),
        })
    }

    async fn terminate(&self, handle: ProcessHandle) -> Result<()> {
        let ignores = self
            .state
            .lock()
            .await
            .processes
            .get(&handle.pid)
            .map(|p| p.ignores_term)
            .unwrap_or(false);
        if !ignores {
            self.exit(handle.pid).await;
        }
        Ok(())
    }

    async fn kill(&self, handle: ProcessHandle) -> Result<()> {
        self.exit(handle.pid).await;
        Ok(())
    }

    async fn is_available(&self, program: &str) -> bool {
        self.state.lock().await.programs.contains_key(program)
    }
}
