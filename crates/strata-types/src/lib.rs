//! Foundation types for Strata.
//!
//! Every blob and composition document in Strata is identified by a
//! [`BlobRef`]: a hash-algorithm tag plus the digest of the blob's bytes.
//! Identical content always produces the same reference, which is what
//! makes deduplication and immutability possible further up the stack.
//!
//! # Key Types
//!
//! - [`BlobRef`] -- content address, textual form `"<algorithm>-<hex digest>"`
//! - [`HashAlgorithm`] -- supported digest functions (BLAKE3, SHA-256)

pub mod blobref;
pub mod error;

pub use blobref::{BlobRef, HashAlgorithm, DIGEST_LEN};
pub use error::TypeError;
