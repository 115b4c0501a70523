use crate::compression::CodecError;
use crate::security::SecurityError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecorderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Security error: {0}")]
    Security(#[from] SecurityError),

    #[error("Recorder is closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, RecorderError>;
