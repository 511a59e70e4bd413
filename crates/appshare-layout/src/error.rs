use appshare_common::WindowId;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LayoutError {
    #[error("grid needs at least one row and one column (got {rows}x{cols})")]
    InvalidGrid { rows: u32, cols: u32 },

    #[error("usable area is empty after applying margins")]
    EmptyArea,

    #[error("window {0} not found")]
    WindowNotFound(WindowId),

    #[error("unknown snap zone: {0}")]
    UnknownZone(String),

    #[error("window set kept changing, gave up after {attempts} attempts")]
    Unstable { attempts: u32 },
}
