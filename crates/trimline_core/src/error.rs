use crate::types::TimeUs;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid duration: {0}")]
    InvalidDuration(TimeUs),

    #[error("Timeline is not ready")]
    NotReady,

    #[error("Timeline duration is already set")]
    AlreadyInitialized,

    #[error("No trim edge is being dragged")]
    NoActiveDrag,

    #[error("Invalid editor settings: {0}")]
    InvalidSettings(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
