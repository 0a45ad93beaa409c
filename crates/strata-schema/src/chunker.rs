use crate::rollsum::RollSum;
use crate::writer::WriterConfig;

/// Chooses chunk boundaries for the writer.
///
/// A policy sees every input byte in order, together with the length of the
/// chunk that byte was appended to, and reports whether the chunk should end
/// after it. Decisions must be a deterministic function of the content fed
/// so far, so that identical input always chunks identically. The writer
/// enforces the maximum chunk size on its own, whatever the policy says.
pub trait ChunkPolicy {
    /// Feed one byte; return `true` to end the current chunk after it.
    fn split_after(&mut self, byte: u8, chunk_len: usize) -> bool;
}

/// Content-defined boundaries from a rolling checksum.
///
/// A boundary falls after any byte where the low `split_bits` bits of the
/// rolling checksum are all ones, provided the chunk has reached the
/// minimum size. With `split_bits = 13` boundaries occur on average every
/// 8 KiB past the minimum.
#[derive(Clone, Debug)]
pub struct RollingPolicy {
    rollsum: RollSum,
    min_chunk_size: usize,
    split_bits: u32,
}

impl RollingPolicy {
    /// `split_bits` is clamped to `1..=31`.
    pub fn new(min_chunk_size: usize, split_bits: u32) -> Self {
        Self {
            rollsum: RollSum::new(),
            min_chunk_size,
            split_bits: split_bits.clamp(1, 31),
        }
    }

    /// A policy using the minimum size and split bits of `config`.
    pub fn from_config(config: &WriterConfig) -> Self {
        Self::new(config.min_chunk_size, config.split_bits)
    }
}

impl ChunkPolicy for RollingPolicy {
    fn split_after(&mut self, byte: u8, chunk_len: usize) -> bool {
        self.rollsum.roll(byte);
        chunk_len >= self.min_chunk_size && self.rollsum.on_split(self.split_bits)
    }
}

/// Fixed-size boundaries, every `size` bytes.
#[derive(Clone, Copy, Debug)]
pub struct FixedPolicy {
    size: usize,
}

impl FixedPolicy {
    pub fn new(size: usize) -> Self {
        Self { size: size.max(1) }
    }
}

impl ChunkPolicy for FixedPolicy {
    fn split_after(&mut self, _byte: u8, chunk_len: usize) -> bool {
        chunk_len >= self.size
    }
}
