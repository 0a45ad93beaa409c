use std::fs::File;
use std::io::Read;
use std::path::PathBuf;

use crate::error::{EmbedError, EmbedResult};

/// zstd level used by [`Opener::compress`].
const COMPRESSION_LEVEL: i32 = 3;

/// Source of an asset's bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Opener {
    /// Bytes stored as-is.
    Inline(Vec<u8>),
    /// A zstd frame holding the bytes.
    Compressed(Vec<u8>),
    /// A file read from disk on open.
    DiskFile(PathBuf),
}

impl Opener {
    /// Compress `data` into a [`Opener::Compressed`].
    pub fn compress(data: &[u8]) -> EmbedResult<Self> {
        let frame = zstd::encode_all(data, COMPRESSION_LEVEL)
            .map_err(|e| EmbedError::Decode(format!("compression failed: {e}")))?;
        Ok(Opener::Compressed(frame))
    }

    /// A reader over the asset's decoded bytes.
    pub fn open(&self) -> EmbedResult<Box<dyn Read + '_>> {
        match self {
            Opener::Inline(bytes) => Ok(Box::new(bytes.as_slice())),
            Opener::Compressed(frame) => {
                let decoder = zstd::stream::read::Decoder::new(frame.as_slice())
                    .map_err(|e| EmbedError::Decode(format!("could not open compressed asset: {e}")))?;
                Ok(Box::new(decoder))
            }
            Opener::DiskFile(path) => Ok(Box::new(File::open(path)?)),
        }
    }

    /// Open and read everything.
    pub fn read_all(&self) -> EmbedResult<Vec<u8>> {
        let mut out = Vec::new();
        self.open()?.read_to_end(&mut out)?;
        Ok(out)
    }
}
