use std::fs;
use std::io::{self, Cursor, Write};
use std::path::{Path, PathBuf};

use strata_types::{BlobRef, HashAlgorithm};
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::traits::{BlobFetcher, BlobStore, FetchedBlob};

/// File-per-blob store rooted at a directory.
///
/// Layout:
/// ```text
/// <root>/<algorithm>/<first two hex digits>/<algorithm>-<hex digest>
/// ```
///
/// New blobs are written to a temporary file in their final directory and
/// renamed into place, so a crash never leaves a partially written blob
/// under its real name. Every fetch re-hashes the file and rejects content
/// that no longer matches its reference.
#[derive(Debug)]
pub struct DiskBlobStore {
    root: PathBuf,
    algorithm: HashAlgorithm,
}

impl DiskBlobStore {
    /// Open (or create) a store rooted at `root`.
    pub fn open(root: impl AsRef<Path>, algorithm: HashAlgorithm) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        debug!(root = %root.display(), %algorithm, "opened disk blob store");
        Ok(Self { root, algorithm })
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path a blob is (or would be) stored at.
    pub fn blob_path(&self, blob: &BlobRef) -> PathBuf {
        let hex = blob.digest_hex();
        self.root
            .join(blob.algorithm().tag())
            .join(&hex[..2])
            .join(blob.to_string())
    }

    /// List every blob in the store, sorted.
    pub fn all_refs(&self) -> StoreResult<Vec<BlobRef>> {
        let mut refs = Vec::new();
        for alg_dir in read_dir_if_exists(&self.root)? {
            for fan_dir in read_dir_if_exists(&alg_dir)? {
                for file in read_dir_if_exists(&fan_dir)? {
                    let Some(name) = file.file_name().and_then(|n| n.to_str()) else {
                        continue;
                    };
                    if name.starts_with('.') {
                        continue;
                    }
                    refs.push(BlobRef::parse(name)?);
                }
            }
        }
        refs.sort();
        Ok(refs)
    }
}

fn read_dir_if_exists(dir: &Path) -> StoreResult<Vec<PathBuf>> {
    match fs::read_dir(dir) {
        Ok(entries) => {
            let mut paths = Vec::new();
            for entry in entries {
                paths.push(entry?.path());
            }
            Ok(paths)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

impl BlobFetcher for DiskBlobStore {
    fn fetch(&self, blob: &BlobRef) -> StoreResult<FetchedBlob> {
        let path = self.blob_path(blob);
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(*blob));
            }
            Err(e) => return Err(e.into()),
        };
        if !blob.verify(&data) {
            let computed = BlobRef::compute(blob.algorithm(), &data);
            warn!(blob = %blob, computed = %computed, path = %path.display(), "blob failed hash verification");
            return Err(StoreError::HashMismatch {
                blob: *blob,
                computed,
            });
        }
        let size = data.len() as u64;
        Ok(FetchedBlob::new(Cursor::new(data), size))
    }
}

impl BlobStore for DiskBlobStore {
    fn put(&self, data: &[u8]) -> StoreResult<BlobRef> {
        let blob = BlobRef::compute(self.algorithm, data);
        let path = self.blob_path(&blob);
        if path.exists() {
            return Ok(blob);
        }
        let dir = path
            .parent()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "blob path has no parent"))?;
        fs::create_dir_all(dir)?;

        let mut tmp = tempfile::Builder::new().prefix(".tmp-").tempfile_in(dir)?;
        tmp.write_all(data)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| e.error)?;
        debug!(blob = %blob.short(), size = data.len(), "wrote blob to disk");
        Ok(blob)
    }

    fn exists(&self, blob: &BlobRef) -> StoreResult<bool> {
        Ok(self.blob_path(blob).is_file())
    }

    fn delete(&self, blob: &BlobRef) -> StoreResult<bool> {
        match fs::remove_file(self.blob_path(blob)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn hash_algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }
}
