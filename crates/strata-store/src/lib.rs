//! Content-addressed blob storage for Strata.
//!
//! A blob store is a pure key-value store: the key of every blob is the
//! [`BlobRef`](strata_types::BlobRef) of its bytes. The store never
//! interprets blob contents; composition documents and raw data chunks look
//! identical at this layer.
//!
//! # Storage Backends
//!
//! All backends implement [`BlobFetcher`] (reads) and [`BlobStore`] (writes):
//!
//! - [`InMemoryBlobStore`] -- `HashMap`-based store for tests and embedding
//! - [`DiskBlobStore`] -- one file per blob under a root directory
//!
//! # Design Rules
//!
//! 1. Blobs are immutable once written (content-addressing guarantees this).
//! 2. Writes are idempotent: putting the same bytes twice yields the same ref.
//! 3. Concurrent reads are always safe.
//! 4. All I/O errors are propagated, never silently ignored.

pub mod disk;
pub mod error;
pub mod memory;
pub mod traits;

pub use disk::DiskBlobStore;
pub use error::{StoreError, StoreResult};
pub use memory::InMemoryBlobStore;
pub use traits::{BlobFetcher, BlobStore, FetchedBlob};
