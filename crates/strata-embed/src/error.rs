use thiserror::Error;

/// Errors from asset lookup and decoding.
#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("asset not found: {0}")]
    NotFound(String),

    #[error("could not decode asset: {0}")]
    Decode(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("asset handle already closed")]
    AlreadyClosed,
}

pub type EmbedResult<T> = Result<T, EmbedError>;
