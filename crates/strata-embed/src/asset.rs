use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::{EmbedError, EmbedResult};

/// An asset held in memory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StaticFile {
    name: String,
    contents: Vec<u8>,
    modtime: DateTime<Utc>,
}

impl StaticFile {
    pub fn new(name: impl Into<String>, contents: Vec<u8>, modtime: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            contents,
            modtime,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn contents(&self) -> &[u8] {
        &self.contents
    }

    pub fn size(&self) -> u64 {
        self.contents.len() as u64
    }

    pub fn modtime(&self) -> DateTime<Utc> {
        self.modtime
    }
}

/// Read-only, seekable handle over a [`StaticFile`].
#[derive(Debug)]
pub struct MemoryFile {
    file: Arc<StaticFile>,
    pos: u64,
    closed: bool,
}

impl MemoryFile {
    pub fn new(file: Arc<StaticFile>) -> Self {
        Self {
            file,
            pos: 0,
            closed: false,
        }
    }

    pub fn stat(&self) -> &StaticFile {
        &self.file
    }

    /// Mark the handle closed. A second call fails.
    pub fn close(&mut self) -> EmbedResult<()> {
        if self.closed {
            return Err(EmbedError::AlreadyClosed);
        }
        self.closed = true;
        Ok(())
    }
}

impl Read for MemoryFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.closed {
            return Err(io::Error::other(EmbedError::AlreadyClosed));
        }
        let contents = self.file.contents();
        if self.pos >= contents.len() as u64 {
            return Ok(0);
        }
        let rest = &contents[self.pos as usize..];
        let n = rest.len().min(buf.len());
        buf[..n].copy_from_slice(&rest[..n]);
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for MemoryFile {
    /// Negative targets clamp to 0; targets past the end are kept.
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => i128::from(offset),
            SeekFrom::Current(delta) => i128::from(self.pos) + i128::from(delta),
            SeekFrom::End(delta) => i128::from(self.file.size()) + i128::from(delta),
        };
        self.pos = u64::try_from(target.max(0)).unwrap_or(u64::MAX);
        Ok(self.pos)
    }
}

/// Handle returned by [`Files::open`](crate::Files::open).
#[derive(Debug)]
pub enum AssetFile {
    Memory(MemoryFile),
    Disk(File),
}

impl AssetFile {
    /// Size of the underlying asset in bytes.
    pub fn size(&self) -> EmbedResult<u64> {
        match self {
            AssetFile::Memory(f) => Ok(f.stat().size()),
            AssetFile::Disk(f) => Ok(f.metadata()?.len()),
        }
    }

    /// Last modification time of the asset.
    pub fn modtime(&self) -> EmbedResult<DateTime<Utc>> {
        match self {
            AssetFile::Memory(f) => Ok(f.stat().modtime()),
            AssetFile::Disk(f) => Ok(f.metadata()?.modified()?.into()),
        }
    }

    pub fn is_memory(&self) -> bool {
        matches!(self, AssetFile::Memory(_))
    }
}

impl Read for AssetFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            AssetFile::Memory(f) => f.read(buf),
            AssetFile::Disk(f) => f.read(buf),
        }
    }
}

impl Seek for AssetFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            AssetFile::Memory(f) => f.seek(pos),
            AssetFile::Disk(f) => f.seek(pos),
        }
    }
}
