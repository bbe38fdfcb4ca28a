use thiserror::Error;

/// All errors produced by murmur-core.
#[derive(Debug, Error)]
pub enum MurmurError {
    #[error("model load failed: {0}")]
    Load(String),

    #[error("worker not ready")]
    NotReady,

    #[error("a transcription is already in progress")]
    Busy,

    #[error("inference error: {0}")]
    Inference(String),

    #[error("transcription cancelled")]
    Cancelled,

    #[error("invalid options: {0}")]
    InvalidOptions(String),

    #[error("model artifact not found: {path}")]
    ModelNotFound { path: std::path::PathBuf },

    #[error("worker is no longer running")]
    WorkerUnavailable,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, MurmurError>;
