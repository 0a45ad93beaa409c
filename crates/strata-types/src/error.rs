use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid blob reference {input:?}: {reason}")]
    InvalidRef { input: String, reason: String },

    #[error("unknown hash algorithm: {0}")]
    UnknownAlgorithm(String),

    #[error("invalid digest length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}
