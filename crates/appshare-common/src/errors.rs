use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("config parse error: {0}")]
    ParseError(String),

    #[error("config validation error: {0}")]
    ValidationError(String),

    #[error("config watch error: {0}")]
    WatchError(String),
}

/// Failures reported by the display surface or the process host.
#[derive(Debug, thiserror::Error)]
pub enum DisplayError {
    #[error("display unavailable: {0}")]
    Unavailable(String),

    #[error("capture failed: {0}")]
    CaptureFailed(String),

    #[error("input injection failed: {0}")]
    InjectFailed(String),

    #[error("window not found: {0}")]
    WindowNotFound(String),

    #[error("window manager error: {0}")]
    WindowManager(String),

    #[error("spawn failed: {0}")]
    SpawnFailed(String),

    #[error("process not found: {0}")]
    ProcessNotFound(u32),

    #[error("tool failed: {0}")]
    ToolFailed(String),

    #[error("not supported: {0}")]
    NotSupported(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let err = ConfigError::FileNotFound(PathBuf::from("/tmp/missing.toml"));
        assert_eq!(err.to_string(), "config file not found: /tmp/missing.toml");

        let err = ConfigError::ParseError("unexpected token".into());
        assert_eq!(err.to_string(), "config parse error: unexpected token");

        let err = ConfigError::ValidationError("capture.frame_rate".into());
        assert_eq!(
            err.to_string(),
            "config validation error: capture.frame_rate"
        );
    }

    #[test]
    fn display_error_display() {
        let err = DisplayError::Unavailable("DISPLAY=:99".into());
        assert_eq!(err.to_string(), "display unavailable: DISPLAY=:99");

        let err = DisplayError::ProcessNotFound(42);
        assert_eq!(err.to_string(), "process not found: 42");
    }

    #[test]
    fn display_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "xdotool");
        let err: DisplayError = io_err.into();
        assert!(matches!(err, DisplayError::Io(_)));
        assert!(err.to_string().contains("xdotool"));
    }
}
