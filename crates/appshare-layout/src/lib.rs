//! Pure window layout computation.
//!
//! Everything here is a function of its inputs: a layout kind, the screen
//! size and an ordered window list go in, target rectangles come out. The
//! engine crate owns the snapshot/apply cycle and the per-display lock.

mod calculation;
pub mod error;
pub mod kind;
mod snap;
mod types;

#[cfg(test)]
mod tests;

pub use error::LayoutError;
pub use kind::{LayoutKind, SnapZone};
pub use types::{LayoutEngine, Placement};

pub type Result<T> = std::result::Result<T, LayoutError>;
