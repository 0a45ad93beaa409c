use strata_types::{BlobRef, TypeError};

/// Errors from blob store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested blob was not found.
    #[error("blob not found: {0}")]
    NotFound(BlobRef),

    /// Content hash mismatch on read (data corruption).
    #[error("hash mismatch for {blob}: stored bytes hash to {computed}")]
    HashMismatch { blob: BlobRef, computed: BlobRef },

    /// A file name in the store could not be parsed as a blob reference.
    #[error("invalid blob reference: {0}")]
    InvalidRef(#[from] TypeError),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
