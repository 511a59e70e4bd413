//! Configuration schema types for appshare.
//!
//! All structs use `serde(default)` so partial configs work correctly.
//! Missing fields are filled with the defaults the server ships with.

mod apps;
mod capture;
mod health;
mod layout;
mod sessions;
mod system;

pub use apps::*;
pub use capture::*;
pub use health::*;
pub use layout::*;
pub use sessions::*;
pub use system::*;

use serde::{Deserialize, Serialize};

/// Current config schema version.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Root configuration.
///
/// Only override what you want to change.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppShareConfig {
    pub apps: AppsConfig,
    pub health: HealthConfig,
    pub restart: RestartConfig,
    pub capture: CaptureConfig,
    pub layout: LayoutConfig,
    pub sessions: SessionsConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}
