use appshare_engine::EngineError;
use thiserror::Error;

/// Why a client request produced an `error` message.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("malformed request: {0}")]
    Malformed(String),

    #[error("failed to encode reply: {0}")]
    Encode(#[from] serde_json::Error),
}

impl RequestError {
    pub fn code(&self) -> &'static str {
        match self {
            RequestError::Engine(e) => e.code(),
            RequestError::Malformed(_) => "bad_request",
            RequestError::Encode(_) => "internal",
        }
    }
}
