//! The application session engine.
//!
//! Launches whitelisted desktop applications on a shared display, keeps
//! them healthy, streams their windows to any number of viewers, routes
//! viewers' input back, arranges windows, and groups viewers into
//! collaborative sessions. [`Engine`] is the entry point; the display and
//! process capabilities come from `appshare-display`.

pub mod auth;
pub mod capture;
mod engine;
pub mod error;
pub mod input;
pub mod layout;
pub mod process;
pub mod session;

pub use auth::{Authorizer, OwnerPolicy, StaticPolicy};
pub use capture::{
    CaptureGeometry, CaptureSettings, ChannelInfo, ChannelMessage, Frame, Subscription,
};
pub use engine::Engine;
pub use error::{EngineError, Result};
pub use input::{Coordinates, InputEvent, InputKind};
pub use layout::{LayoutPreset, PresetConfig, PresetOutcome, PresetSnap};
pub use process::InstanceSnapshot;
pub use session::{Participant, Session, SessionSettings, SessionStats, SessionSummary};
