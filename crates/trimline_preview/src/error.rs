use thiserror::Error;
use trimline_core::CoreError;

#[derive(Debug, Error)]
pub enum PreviewError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("failed to start mpv: {0}")]
    Spawn(std::io::Error),

    #[error("mpv socket did not appear")]
    SocketTimeout,

    #[error("mpv is not running")]
    NotRunning,

    #[error("mpv rejected command: {0}")]
    Rejected(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PreviewError>;
