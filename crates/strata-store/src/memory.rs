use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{Arc, RwLock};

use strata_types::{BlobRef, HashAlgorithm};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::traits::{BlobFetcher, BlobStore, FetchedBlob};

/// Shared byte buffer that can back a `Cursor` without copying.
#[derive(Clone)]
struct SharedBytes(Arc<[u8]>);

impl AsRef<[u8]> for SharedBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// In-memory, HashMap-based blob store.
///
/// Intended for tests and embedding. Blobs live behind a `RwLock` and are
/// shared with readers through reference-counted buffers, so a fetch never
/// copies blob bytes.
pub struct InMemoryBlobStore {
    algorithm: HashAlgorithm,
    blobs: RwLock<HashMap<BlobRef, Arc<[u8]>>>,
}

impl InMemoryBlobStore {
    /// Create an empty store addressing blobs with BLAKE3.
    pub fn new() -> Self {
        Self::with_algorithm(HashAlgorithm::default())
    }

    /// Create an empty store addressing blobs with `algorithm`.
    pub fn with_algorithm(algorithm: HashAlgorithm) -> Self {
        Self {
            algorithm,
            blobs: RwLock::new(HashMap::new()),
        }
    }

    /// Number of blobs currently stored.
    pub fn len(&self) -> usize {
        self.blobs.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.blobs.read().expect("lock poisoned").is_empty()
    }

    /// Total bytes across all stored blobs.
    pub fn total_bytes(&self) -> u64 {
        self.blobs
            .read()
            .expect("lock poisoned")
            .values()
            .map(|b| b.len() as u64)
            .sum()
    }

    /// A copy of the blob's bytes, if present.
    pub fn contents(&self, blob: &BlobRef) -> Option<Vec<u8>> {
        let map = self.blobs.read().expect("lock poisoned");
        map.get(blob).map(|b| b.to_vec())
    }

    /// Insert bytes under an arbitrary reference, bypassing hashing.
    ///
    /// Lets tests model a corrupt or adversarial store.
    pub fn insert_raw(&self, blob: BlobRef, data: Vec<u8>) {
        let mut map = self.blobs.write().expect("lock poisoned");
        map.insert(blob, data.into());
    }

    /// Remove all blobs from the store.
    pub fn clear(&self) {
        self.blobs.write().expect("lock poisoned").clear();
    }

    /// Return a sorted list of all blob references in the store.
    pub fn all_refs(&self) -> Vec<BlobRef> {
        let map = self.blobs.read().expect("lock poisoned");
        let mut refs: Vec<BlobRef> = map.keys().copied().collect();
        refs.sort();
        refs
    }
}

impl Default for InMemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BlobFetcher for InMemoryBlobStore {
    fn fetch(&self, blob: &BlobRef) -> StoreResult<FetchedBlob> {
        let map = self.blobs.read().expect("lock poisoned");
        let bytes = map.get(blob).ok_or(StoreError::NotFound(*blob))?;
        let size = bytes.len() as u64;
        Ok(FetchedBlob::new(Cursor::new(SharedBytes(Arc::clone(bytes))), size))
    }
}

impl BlobStore for InMemoryBlobStore {
    fn put(&self, data: &[u8]) -> StoreResult<BlobRef> {
        let blob = BlobRef::compute(self.algorithm, data);
        let mut map = self.blobs.write().expect("lock poisoned");
        map.entry(blob).or_insert_with(|| {
            debug!(blob = %blob.short(), size = data.len(), "stored blob");
            data.into()
        });
        Ok(blob)
    }

    fn exists(&self, blob: &BlobRef) -> StoreResult<bool> {
        let map = self.blobs.read().expect("lock poisoned");
        Ok(map.contains_key(blob))
    }

    fn delete(&self, blob: &BlobRef) -> StoreResult<bool> {
        let mut map = self.blobs.write().expect("lock poisoned");
        Ok(map.remove(blob).is_some())
    }

    fn hash_algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }
}

impl std::fmt::Debug for InMemoryBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBlobStore")
            .field("algorithm", &self.algorithm)
            .field("blob_count", &self.len())
            .finish()
    }
}
