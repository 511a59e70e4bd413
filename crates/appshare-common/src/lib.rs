pub mod errors;
pub mod events;
pub mod id;
pub mod types;

pub use errors::{ConfigError, DisplayError};
pub use events::{CloseReason, EngineEvent, EventBus};
pub use id::{InstanceId, SessionId, SubscriberId, UserId, WindowId};
pub use types::{ChannelTarget, InstanceState, Rect, ScreenSize, WindowInfo};
