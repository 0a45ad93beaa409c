use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::io::{self, Read, Seek, SeekFrom};

use serde::{Deserialize, Serialize};
use strata_store::BlobFetcher;
use strata_types::BlobRef;
use tracing::debug;

use crate::document::Document;
use crate::error::{SchemaError, SchemaResult};
use crate::part::{Part, PartSource};

/// Reader tuning.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderOptions {
    /// Deepest chain of nested `bytesRef` documents a read may follow.
    pub max_depth: usize,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self { max_depth: 32 }
    }
}

/// Seekable reader over the virtual stream of a composition document.
///
/// Nothing beyond the root document is fetched up front. Raw blobs are
/// fetched the first time a read touches a part that references them and
/// are cached for the life of the reader; nested documents get their own
/// sub-reader, opened on first use and cached per part. Seeking only moves
/// the cursor.
///
/// A single `read` never crosses a part boundary; callers that want a full
/// buffer loop (as [`Read::read_to_end`] and [`read_range`](Self::read_range)
/// do).
pub struct FileReader<'a> {
    fetcher: &'a dyn BlobFetcher,
    document: Document,
    /// `starts[i]` is the stream offset of the first byte of part `i`.
    starts: Vec<u64>,
    pos: u64,
    depth: usize,
    options: ReaderOptions,
    blobs: HashMap<BlobRef, Vec<u8>>,
    nested: HashMap<usize, FileReader<'a>>,
    closed: bool,
}

impl<'a> FileReader<'a> {
    /// Fetch and decode the document at `root` and open a reader over it.
    ///
    /// Structural errors in the root document surface here; errors in
    /// nested documents surface on the first read that needs them.
    pub fn open(fetcher: &'a dyn BlobFetcher, root: &BlobRef) -> SchemaResult<Self> {
        Self::open_with(fetcher, root, ReaderOptions::default())
    }

    pub fn open_with(
        fetcher: &'a dyn BlobFetcher,
        root: &BlobRef,
        options: ReaderOptions,
    ) -> SchemaResult<Self> {
        Self::open_at_depth(fetcher, root, 0, options)
    }

    /// Open a reader over an already decoded document.
    pub fn from_document(fetcher: &'a dyn BlobFetcher, document: Document) -> Self {
        Self::from_document_with(fetcher, document, ReaderOptions::default())
    }

    pub fn from_document_with(
        fetcher: &'a dyn BlobFetcher,
        document: Document,
        options: ReaderOptions,
    ) -> Self {
        Self::new(fetcher, document, 0, options)
    }

    fn open_at_depth(
        fetcher: &'a dyn BlobFetcher,
        root: &BlobRef,
        depth: usize,
        options: ReaderOptions,
    ) -> SchemaResult<Self> {
        if depth > options.max_depth {
            return Err(SchemaError::RecursionLimitExceeded {
                limit: options.max_depth,
            });
        }
        let data = fetcher.fetch_bytes(root)?;
        let document = Document::from_bytes(&data)?;
        debug!(
            document = %root.short(),
            depth,
            parts = document.parts().len(),
            size = document.total_size(),
            "opened composition document"
        );
        Ok(Self::new(fetcher, document, depth, options))
    }

    fn new(
        fetcher: &'a dyn BlobFetcher,
        document: Document,
        depth: usize,
        options: ReaderOptions,
    ) -> Self {
        let mut starts = Vec::with_capacity(document.parts().len());
        let mut offset = 0u64;
        for part in document.parts() {
            starts.push(offset);
            offset += part.size;
        }
        Self {
            fetcher,
            document,
            starts,
            pos: 0,
            depth,
            options,
            blobs: HashMap::new(),
            nested: HashMap::new(),
            closed: false,
        }
    }

    /// Length of the virtual stream.
    pub fn size(&self) -> u64 {
        self.document.total_size()
    }

    /// Current cursor offset. May lie past the end of the stream.
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// The document this reader resolves.
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Index of the part containing stream offset `pos`; `pos < size()`.
    ///
    /// Zero-length parts share their start with the following part, so the
    /// last part starting at or before `pos` is the one that owns it.
    fn part_index(&self, pos: u64) -> usize {
        self.starts.partition_point(|&start| start <= pos) - 1
    }

    /// Read from the cursor into `buf`, stopping at the end of the part the
    /// cursor is in. Returns 0 at (or past) the end of the stream.
    pub fn read_bytes(&mut self, buf: &mut [u8]) -> SchemaResult<usize> {
        if self.closed {
            return Err(SchemaError::Closed);
        }
        if buf.is_empty() || self.pos >= self.size() {
            return Ok(0);
        }
        let index = self.part_index(self.pos);
        let part = self.document.parts()[index];
        let local = self.pos - self.starts[index];
        let n = usize::try_from(part.size - local).map_or(buf.len(), |left| left.min(buf.len()));
        let out = &mut buf[..n];

        let n = match part.source {
            PartSource::Zero => {
                out.fill(0);
                n
            }
            PartSource::Blob(blob) => {
                self.read_blob(index, blob, &part, local, out)?;
                n
            }
            PartSource::Bytes(document) => self.read_nested(index, document, &part, local, out)?,
        };
        self.pos += n as u64;
        Ok(n)
    }

    fn read_blob(
        &mut self,
        index: usize,
        blob: BlobRef,
        part: &Part,
        local: u64,
        out: &mut [u8],
    ) -> SchemaResult<()> {
        let fetcher = self.fetcher;
        let data = match self.blobs.entry(blob) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) => {
                let data = fetcher.fetch_bytes(&blob)?;
                debug!(blob = %blob.short(), size = data.len(), "fetched blob");
                e.insert(data)
            }
        };
        let available = data.len() as u64;
        if available < part.end() {
            return Err(SchemaError::PartOutOfRange {
                index,
                blob,
                needed: part.end(),
                available,
            });
        }
        let from = (part.offset + local) as usize;
        out.copy_from_slice(&data[from..from + out.len()]);
        Ok(())
    }

    fn read_nested(
        &mut self,
        index: usize,
        document: BlobRef,
        part: &Part,
        local: u64,
        out: &mut [u8],
    ) -> SchemaResult<usize> {
        let fetcher = self.fetcher;
        let depth = self.depth + 1;
        let options = self.options;
        let sub = match self.nested.entry(index) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) => {
                let sub = FileReader::open_at_depth(fetcher, &document, depth, options)?;
                if sub.size() < part.end() {
                    return Err(SchemaError::PartOutOfRange {
                        index,
                        blob: document,
                        needed: part.end(),
                        available: sub.size(),
                    });
                }
                e.insert(sub)
            }
        };
        sub.seek_from(SeekFrom::Start(part.offset + local))?;
        let n = sub.read_bytes(out)?;
        if n == 0 {
            return Err(SchemaError::PartOutOfRange {
                index,
                blob: document,
                needed: part.end(),
                available: sub.size(),
            });
        }
        Ok(n)
    }

    /// Move the cursor. Negative results clamp to 0; offsets past the end
    /// are allowed and read as end of stream. Performs no I/O.
    pub fn seek_from(&mut self, pos: SeekFrom) -> SchemaResult<u64> {
        if self.closed {
            return Err(SchemaError::Closed);
        }
        let target = match pos {
            SeekFrom::Start(offset) => i128::from(offset),
            SeekFrom::Current(delta) => i128::from(self.pos) + i128::from(delta),
            SeekFrom::End(delta) => i128::from(self.size()) + i128::from(delta),
        };
        self.pos = u64::try_from(target.max(0)).unwrap_or(u64::MAX);
        Ok(self.pos)
    }

    /// Fill `buf` from stream offset `offset`, crossing part boundaries as
    /// needed. Returns the number of bytes read, short only at end of stream.
    /// Leaves the cursor after the last byte read.
    pub fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> SchemaResult<usize> {
        self.seek_from(SeekFrom::Start(offset))?;
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.read_bytes(&mut buf[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(filled)
    }

    /// Read up to `len` bytes starting at `offset`.
    pub fn read_range(&mut self, offset: u64, len: usize) -> SchemaResult<Vec<u8>> {
        let available = self.size().saturating_sub(offset);
        let want = usize::try_from(available).map_or(len, |a| a.min(len));
        let mut out = vec![0u8; want];
        let n = self.read_at(offset, &mut out)?;
        out.truncate(n);
        Ok(out)
    }

    /// Drop cached blobs and nested readers.
    ///
    /// Any later read, seek or close returns [`SchemaError::Closed`].
    pub fn close(&mut self) -> SchemaResult<()> {
        if self.closed {
            return Err(SchemaError::Closed);
        }
        debug!(
            depth = self.depth,
            blobs = self.blobs.len(),
            nested = self.nested.len(),
            "closing reader"
        );
        self.blobs.clear();
        self.nested.clear();
        self.closed = true;
        Ok(())
    }
}

impl Read for FileReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_bytes(buf).map_err(io::Error::from)
    }
}

impl Seek for FileReader<'_> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.seek_from(pos).map_err(io::Error::from)
    }
}

impl fmt::Debug for FileReader<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileReader")
            .field("size", &self.size())
            .field("pos", &self.pos)
            .field("depth", &self.depth)
            .field("parts", &self.document.parts().len())
            .field("closed", &self.closed)
            .finish()
    }
}
