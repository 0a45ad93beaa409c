use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strata_store::BlobStore;
use strata_types::{BlobRef, HashAlgorithm};
use tracing::debug;

use crate::error::{SchemaError, SchemaResult};
use crate::part::{BytesPart, Part};

/// The only document version this crate reads and writes.
pub const SCHEMA_VERSION: u32 = 1;

/// Kind of composition document.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocType {
    /// Top-level document for a named file.
    File,
    /// Anonymous intermediate document referenced through `bytesRef`.
    Bytes,
}

impl fmt::Display for DocType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File => write!(f, "file"),
            Self::Bytes => write!(f, "bytes"),
        }
    }
}

/// Serialized layout. Field order here is the canonical field order.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireDocument {
    version: u32,
    #[serde(rename = "type")]
    doc_type: DocType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    unix_mtime: Option<DateTime<Utc>>,
    parts: Vec<BytesPart>,
}

/// Metadata describing a file handed to the writer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FileMap {
    pub name: Option<String>,
    pub unix_mtime: Option<DateTime<Utc>>,
}

impl FileMap {
    /// A file map carrying `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            unix_mtime: None,
        }
    }

    /// Attach a modification time.
    pub fn with_mtime(mut self, mtime: DateTime<Utc>) -> Self {
        self.unix_mtime = Some(mtime);
        self
    }
}

/// A validated composition document.
///
/// The virtual stream of a document is the concatenation of its parts'
/// spans, in order; its length is [`total_size`](Self::total_size), which
/// always equals the sum of the part sizes. Documents are immutable values:
/// their identity is the [`BlobRef`] of [`to_bytes`](Self::to_bytes), and the
/// encoding is canonical, so equal documents always produce equal refs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Document {
    doc_type: DocType,
    name: Option<String>,
    unix_mtime: Option<DateTime<Utc>>,
    parts: Vec<Part>,
    total_size: u64,
}

impl Document {
    /// An empty `"file"` document described by `file_map`.
    pub fn file(file_map: &FileMap) -> Self {
        Self {
            doc_type: DocType::File,
            name: file_map.name.clone(),
            unix_mtime: file_map.unix_mtime,
            parts: Vec::new(),
            total_size: 0,
        }
    }

    /// An empty `"bytes"` document.
    pub fn bytes() -> Self {
        Self {
            doc_type: DocType::Bytes,
            name: None,
            unix_mtime: None,
            parts: Vec::new(),
            total_size: 0,
        }
    }

    /// Replace the part list, validating it against `total_size`.
    ///
    /// Fails with [`SchemaError::AmbiguousPart`] if a part names both a blob
    /// and a nested document, and with [`SchemaError::SizeMismatch`] if the
    /// part sizes do not add up to `total_size`. On failure the document is
    /// left unchanged.
    pub fn populate(&mut self, total_size: u64, parts: &[BytesPart]) -> SchemaResult<()> {
        let parts = validate_parts(parts)?;
        let actual = sum_sizes(&parts);
        if actual != u128::from(total_size) {
            return Err(SchemaError::SizeMismatch {
                declared: total_size,
                actual,
            });
        }
        self.parts = parts;
        self.total_size = total_size;
        Ok(())
    }

    pub fn doc_type(&self) -> DocType {
        self.doc_type
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn unix_mtime(&self) -> Option<DateTime<Utc>> {
        self.unix_mtime
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    /// Length of the document's virtual stream.
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// Canonical JSON encoding.
    ///
    /// Fields are always written in the same order, absent optional fields
    /// are omitted, and no insignificant whitespace is emitted.
    pub fn to_bytes(&self) -> SchemaResult<Vec<u8>> {
        let wire = WireDocument {
            version: SCHEMA_VERSION,
            doc_type: self.doc_type,
            name: self.name.clone(),
            unix_mtime: self.unix_mtime,
            parts: self.parts.iter().map(BytesPart::from).collect(),
        };
        serde_json::to_vec(&wire).map_err(|e| SchemaError::Decode(e.to_string()))
    }

    /// Decode and validate a document.
    pub fn from_bytes(data: &[u8]) -> SchemaResult<Self> {
        let wire: WireDocument =
            serde_json::from_slice(data).map_err(|e| SchemaError::Decode(e.to_string()))?;
        if wire.version != SCHEMA_VERSION {
            return Err(SchemaError::Decode(format!(
                "unsupported document version {}",
                wire.version
            )));
        }
        if wire.doc_type == DocType::Bytes && (wire.name.is_some() || wire.unix_mtime.is_some()) {
            return Err(SchemaError::Decode(
                "name and unixMtime are only valid on file documents".into(),
            ));
        }
        let parts = validate_parts(&wire.parts)?;
        let total = sum_sizes(&parts);
        let total_size = u64::try_from(total).map_err(|_| {
            SchemaError::Decode(format!("part sizes sum to {total}, beyond u64"))
        })?;
        Ok(Self {
            doc_type: wire.doc_type,
            name: wire.name,
            unix_mtime: wire.unix_mtime,
            parts,
            total_size,
        })
    }

    /// The content address this document has under `algorithm`.
    pub fn blob_ref(&self, algorithm: HashAlgorithm) -> SchemaResult<BlobRef> {
        Ok(BlobRef::compute(algorithm, &self.to_bytes()?))
    }

    /// Write the canonical encoding to `store` and return its ref.
    pub fn store(&self, store: &dyn BlobStore) -> SchemaResult<BlobRef> {
        let data = self.to_bytes()?;
        let blob = store.put(&data)?;
        debug!(
            blob = %blob.short(),
            doc_type = %self.doc_type,
            parts = self.parts.len(),
            size = self.total_size,
            "stored composition document"
        );
        Ok(blob)
    }
}

fn validate_parts(parts: &[BytesPart]) -> SchemaResult<Vec<Part>> {
    parts
        .iter()
        .enumerate()
        .map(|(index, part)| Part::from_wire(index, part))
        .collect()
}

fn sum_sizes(parts: &[Part]) -> u128 {
    parts.iter().map(|p| u128::from(p.size)).sum()
}
