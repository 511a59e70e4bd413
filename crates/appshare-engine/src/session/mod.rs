//! Collaborative sessions: several users sharing one instance's stream.

mod manager;
mod types;

#[cfg(test)]
mod tests;

pub use manager::SessionManager;
pub use types::{Participant, Session, SessionSettings, SessionStats, SessionSummary};
