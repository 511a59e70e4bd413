//! Capabilities the engine needs from the host: a display surface to
//! query, capture and drive, and a process host to launch and probe apps.
//!
//! Three backends ship here: [`X11Display`] drives the usual X11 command
//! line tools, [`NativeProcessHost`] runs real child processes, and
//! [`VirtualDisplay`]/[`VirtualProcessHost`] keep everything in memory.

pub mod adapter;
pub mod input;
pub mod native;
pub mod process;
pub mod virtual_display;
pub mod x11;

pub use adapter::{DisplayAdapter, RawFrame};
pub use input::{InputAction, KeyAction, Modifier, MouseButton, PointerAction, ScrollDirection};
pub use native::NativeProcessHost;
pub use process::{LaunchSpec, ProbeReport, ProcessHandle, ProcessHost};
pub use virtual_display::{ProgramBehavior, VirtualDisplay, VirtualProcessHost};
pub use x11::X11Display;

pub type Result<T> = std::result::Result<T, appshare_common::DisplayError>;
