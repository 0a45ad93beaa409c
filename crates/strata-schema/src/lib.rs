//! Composition documents for Strata.
//!
//! A file of any size is stored as raw data blobs plus a small JSON
//! *composition document* listing the ordered [`Part`]s that make up its
//! bytes. A part is a slice of a raw blob, a slice of another document's
//! virtual stream, or a run of zeros. Large files nest: the writer groups
//! parts into intermediate `"bytes"` documents so that no single metadata
//! blob grows without bound.
//!
//! # Architecture
//!
//! - [`Document`] -- validated part list with canonical JSON encoding
//! - [`FileReader`] -- lazy, seekable reader over a document's virtual stream
//! - [`write_file_map`] -- splits a byte stream into blobs and writes the document tree
//! - [`ChunkPolicy`] -- pluggable, content-defined chunk boundary selection
//!
//! # Round trip
//!
//! For any ref returned by [`write_file_map`], reading `[off, off + len)`
//! through a [`FileReader`] reproduces exactly the same range of the input.

pub mod chunker;
pub mod document;
pub mod error;
pub mod part;
pub mod reader;
pub mod rollsum;
pub mod writer;

pub use chunker::{ChunkPolicy, FixedPolicy, RollingPolicy};
pub use document::{DocType, Document, FileMap, SCHEMA_VERSION};
pub use error::{SchemaError, SchemaResult};
pub use part::{BytesPart, Part, PartSource};
pub use reader::{FileReader, ReaderOptions};
pub use rollsum::RollSum;
pub use writer::{write_file_map, write_file_map_with, WriterConfig};
