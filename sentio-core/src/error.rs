use thiserror::Error;

/// All errors produced by sentio-core.
#[derive(Debug, Error)]
pub enum SentioError {
    #[error("engine is already running")]
    AlreadyRunning,

    #[error("engine is not running")]
    NotRunning,

    #[error("session is closed — event was not accepted")]
    SessionClosed,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, SentioError>;
