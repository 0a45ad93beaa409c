use std::fmt;
use std::io::Read;

use strata_types::{BlobRef, HashAlgorithm};

use crate::error::StoreResult;

/// A fetched blob: a reader over its bytes and the size of the blob.
pub struct FetchedBlob {
    /// Reader positioned at the first byte of the blob.
    pub reader: Box<dyn Read + Send>,
    /// Size of the blob in bytes.
    pub size: u64,
}

impl FetchedBlob {
    /// Wrap a reader and its known size.
    pub fn new(reader: impl Read + Send + 'static, size: u64) -> Self {
        Self {
            reader: Box::new(reader),
            size,
        }
    }

    /// Drain the reader into a buffer.
    pub fn into_bytes(mut self) -> StoreResult<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.size as usize);
        self.reader.read_to_end(&mut buf)?;
        Ok(buf)
    }
}

impl fmt::Debug for FetchedBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchedBlob").field("size", &self.size).finish()
    }
}

/// Read side of a content-addressed blob store.
///
/// Implementations must satisfy these invariants:
/// - Repeated fetches of the same reference return byte-identical content.
/// - A missing blob is reported as [`StoreError::NotFound`](crate::StoreError::NotFound).
/// - Fetching is safe from any number of threads at once.
pub trait BlobFetcher: Send + Sync {
    /// Fetch a blob by reference.
    fn fetch(&self, blob: &BlobRef) -> StoreResult<FetchedBlob>;

    /// Fetch a blob and read it fully into memory.
    fn fetch_bytes(&self, blob: &BlobRef) -> StoreResult<Vec<u8>> {
        self.fetch(blob)?.into_bytes()
    }
}

/// Content-addressed blob store.
///
/// `put` is idempotent: the same bytes always produce the same [`BlobRef`]
/// and are stored once.
pub trait BlobStore: BlobFetcher {
    /// Store `data` and return its content address.
    fn put(&self, data: &[u8]) -> StoreResult<BlobRef>;

    /// Check whether a blob exists in the store.
    fn exists(&self, blob: &BlobRef) -> StoreResult<bool>;

    /// Delete a blob. Returns `true` if it existed.
    ///
    /// Intended for garbage collection only. Deleting a blob that is still
    /// referenced by a composition document breaks every reader of it.
    fn delete(&self, blob: &BlobRef) -> StoreResult<bool>;

    /// The algorithm `put` uses to address new blobs.
    fn hash_algorithm(&self) -> HashAlgorithm;
}
