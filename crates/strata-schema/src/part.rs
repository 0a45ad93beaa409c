use serde::{Deserialize, Serialize};
use strata_types::BlobRef;

use crate::error::{SchemaError, SchemaResult};

/// Wire form of a part, as it appears in a document's `parts` array.
///
/// At most one of `blob_ref` and `bytes_ref` may be set. Validation into a
/// [`Part`] happens when a [`Document`](crate::Document) is populated or
/// decoded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BytesPart {
    /// Raw blob this part slices.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blob_ref: Option<BlobRef>,
    /// Composition document whose virtual stream this part slices.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytes_ref: Option<BlobRef>,
    /// Bytes to skip at the start of the referenced content.
    pub offset: u64,
    /// Length of this part's span in the parent stream.
    pub size: u64,
}

impl BytesPart {
    /// A slice `[offset, offset + size)` of a raw blob.
    pub fn blob(blob: BlobRef, offset: u64, size: u64) -> Self {
        Self {
            blob_ref: Some(blob),
            bytes_ref: None,
            offset,
            size,
        }
    }

    /// A slice `[offset, offset + size)` of a nested document's stream.
    pub fn bytes(document: BlobRef, offset: u64, size: u64) -> Self {
        Self {
            blob_ref: None,
            bytes_ref: Some(document),
            offset,
            size,
        }
    }

    /// `size` zero bytes.
    pub fn zero(size: u64) -> Self {
        Self {
            blob_ref: None,
            bytes_ref: None,
            offset: 0,
            size,
        }
    }
}

/// Where a part's bytes come from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PartSource {
    /// Bytes of a raw blob.
    Blob(BlobRef),
    /// Bytes of the virtual stream of a nested composition document.
    Bytes(BlobRef),
    /// Zero fill; no storage and no fetch.
    Zero,
}

/// A validated span of a virtual stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Part {
    pub source: PartSource,
    pub offset: u64,
    pub size: u64,
}

impl Part {
    pub fn blob(blob: BlobRef, offset: u64, size: u64) -> Self {
        Self {
            source: PartSource::Blob(blob),
            offset,
            size,
        }
    }

    pub fn bytes(document: BlobRef, offset: u64, size: u64) -> Self {
        Self {
            source: PartSource::Bytes(document),
            offset,
            size,
        }
    }

    pub fn zero(size: u64) -> Self {
        Self {
            source: PartSource::Zero,
            offset: 0,
            size,
        }
    }

    /// Validate the wire form of the part at `index` of a document.
    pub fn from_wire(index: usize, part: &BytesPart) -> SchemaResult<Self> {
        let source = match (part.blob_ref, part.bytes_ref) {
            (Some(_), Some(_)) => return Err(SchemaError::AmbiguousPart { index }),
            (Some(blob), None) => PartSource::Blob(blob),
            (None, Some(document)) => PartSource::Bytes(document),
            (None, None) => PartSource::Zero,
        };
        if part.offset.checked_add(part.size).is_none() {
            return Err(SchemaError::Decode(format!(
                "part {index}: offset {} + size {} overflows",
                part.offset, part.size
            )));
        }
        Ok(Self {
            source,
            offset: part.offset,
            size: part.size,
        })
    }

    /// End of the referenced range: `offset + size`.
    pub fn end(&self) -> u64 {
        self.offset + self.size
    }
}

impl From<&Part> for BytesPart {
    fn from(part: &Part) -> Self {
        let (blob_ref, bytes_ref) = match part.source {
            PartSource::Blob(blob) => (Some(blob), None),
            PartSource::Bytes(document) => (None, Some(document)),
            PartSource::Zero => (None, None),
        };
        Self {
            blob_ref,
            bytes_ref,
            offset: part.offset,
            size: part.size,
        }
    }
}
