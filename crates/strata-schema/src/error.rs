use std::io;

use strata_store::StoreError;
use strata_types::BlobRef;

/// Errors from composition document, reader, and writer operations.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// The document bytes are malformed, of an unknown type or version, or
    /// missing required fields.
    #[error("schema decode error: {0}")]
    Decode(String),

    /// The declared total size differs from the sum of the part sizes.
    #[error("size mismatch: declared {declared} bytes, parts sum to {actual}")]
    SizeMismatch { declared: u64, actual: u128 },

    /// A part sets both `blobRef` and `bytesRef`.
    #[error("part {index} sets both blobRef and bytesRef")]
    AmbiguousPart { index: usize },

    /// A referenced blob or document does not exist in the store.
    #[error("blob not found: {0}")]
    BlobNotFound(BlobRef),

    /// Transport or disk fault from the fetch collaborator or the source.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Nested documents go deeper than the configured limit.
    #[error("nesting limit of {limit} documents exceeded")]
    RecursionLimitExceeded { limit: usize },

    /// A part reaches past the end of the blob or document it slices.
    #[error("part {index} needs bytes up to {needed} of {blob}, which has only {available}")]
    PartOutOfRange {
        index: usize,
        blob: BlobRef,
        needed: u64,
        available: u64,
    },

    /// Any other store failure (e.g. a blob that failed verification).
    #[error("store error: {0}")]
    Store(StoreError),

    /// The reader was used after `close()`.
    #[error("reader is closed")]
    Closed,

    /// Writer configuration is unusable.
    #[error("invalid writer configuration: {0}")]
    InvalidConfig(String),
}

impl From<StoreError> for SchemaError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(blob) => Self::BlobNotFound(blob),
            StoreError::Io(e) => Self::Io(e),
            other => Self::Store(other),
        }
    }
}

impl From<SchemaError> for io::Error {
    fn from(err: SchemaError) -> Self {
        let kind = match &err {
            SchemaError::BlobNotFound(_) => io::ErrorKind::NotFound,
            SchemaError::Decode(_)
            | SchemaError::SizeMismatch { .. }
            | SchemaError::AmbiguousPart { .. }
            | SchemaError::PartOutOfRange { .. } => io::ErrorKind::InvalidData,
            SchemaError::InvalidConfig(_) => io::ErrorKind::InvalidInput,
            _ => io::ErrorKind::Other,
        };
        match err {
            SchemaError::Io(e) => e,
            other => io::Error::new(kind, other),
        }
    }
}

/// Result alias for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;
