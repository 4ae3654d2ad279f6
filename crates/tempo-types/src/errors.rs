use thiserror::Error;

pub type Result<T, E = TempoError> = std::result::Result<T, E>;

/// Unified error type covering common failure scenarios across subsystems.
#[derive(Debug, Error)]
pub enum TempoError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("codec error: {0}")]
    Codec(String),
    #[error("rules error: {0}")]
    Rules(String),
    #[error("premove error: {0}")]
    Premove(String),
    #[error("clock error: {0}")]
    Clock(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("session error: {0}")]
    Session(String),
    #[error("operational error: {0}")]
    Ops(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
