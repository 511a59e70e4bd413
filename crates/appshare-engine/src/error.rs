use appshare_common::{ConfigError, DisplayError};
use appshare_layout::LayoutError;
use thiserror::Error;

/// Everything an engine operation can fail with.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("not allowed: {0}")]
    NotAllowed(String),

    #[error("at capacity: limit of {limit} reached")]
    AtCapacity { limit: usize },

    #[error("{app} did not become ready within {timeout_ms} ms")]
    LaunchTimeout { app: String, timeout_ms: u64 },

    #[error("{0} crashed")]
    ProcessCrashed(String),

    #[error("{instance_id} exceeded its resource limits: {detail}")]
    ResourceExceeded { instance_id: String, detail: String },

    #[error("display unavailable: {0}")]
    DisplayUnavailable(String),

    #[error("invalid input target: {0}")]
    InputTargetInvalid(String),

    #[error("frame encoding failed: {0}")]
    EncodingFailure(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error(transparent)]
    Display(#[from] DisplayError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Layout(#[from] LayoutError),
}

impl EngineError {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        EngineError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// Stable machine-readable code for clients.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::NotAllowed(_) => "not_allowed",
            EngineError::AtCapacity { .. } => "at_capacity",
            EngineError::LaunchTimeout { .. } => "launch_timeout",
            EngineError::ProcessCrashed(_) => "process_crashed",
            EngineError::ResourceExceeded { .. } => "resource_exceeded",
            EngineError::DisplayUnavailable(_) => "display_unavailable",
            EngineError::InputTargetInvalid(_) => "input_target_invalid",
            EngineError::EncodingFailure(_) => "encoding_failure",
            EngineError::InvalidArgument(_) => "invalid_argument",
            EngineError::NotFound { .. } => "not_found",
            EngineError::Display(_) => "display_error",
            EngineError::Config(_) => "config_error",
            EngineError::Layout(LayoutError::Unstable { .. }) => "layout_unstable",
            EngineError::Layout(_) => "layout_error",
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(EngineError::AtCapacity { limit: 1 }.code(), "at_capacity");
        assert_eq!(
            EngineError::InvalidArgument("x".into()).code(),
            "invalid_argument"
        );
        assert_eq!(
            EngineError::not_found("session", "abc").to_string(),
            "session not found: abc"
        );
        assert_eq!(
            EngineError::from(LayoutError::Unstable { attempts: 3 }).code(),
            "layout_unstable"
        );
        assert_eq!(
            EngineError::from(DisplayError::CaptureFailed("x".into())).code(),
            "display_error"
        );
    }

    #[test]
    fn wrapped_errors_keep_their_message() {
        let err = EngineError::from(LayoutError::EmptyArea);
        assert_eq!(err.to_string(), "usable area is empty after applying margins");
    }
}
