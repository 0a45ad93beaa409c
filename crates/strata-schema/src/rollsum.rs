//! Rolling checksum over a fixed window, in the style of rsync/bup.
//!
//! The checksum of the last [`WINDOW_SIZE`] bytes can be updated in O(1) per
//! byte, which makes it usable for picking chunk boundaries that depend only
//! on local content.

/// Number of trailing bytes the checksum covers.
pub const WINDOW_SIZE: usize = 64;

const CHAR_OFFSET: u32 = 31;

/// Rolling checksum state.
#[derive(Clone, Debug)]
pub struct RollSum {
    s1: u32,
    s2: u32,
    window: [u8; WINDOW_SIZE],
    wofs: usize,
}

impl RollSum {
    /// A checksum over a window of zero bytes.
    pub fn new() -> Self {
        Self {
            s1: WINDOW_SIZE as u32 * CHAR_OFFSET,
            s2: WINDOW_SIZE as u32 * (WINDOW_SIZE as u32 - 1) * CHAR_OFFSET,
            window: [0u8; WINDOW_SIZE],
            wofs: 0,
        }
    }

    /// Push one byte into the window, evicting the oldest.
    pub fn roll(&mut self, ch: u8) {
        let drop = self.window[self.wofs];
        self.add(drop, ch);
        self.window[self.wofs] = ch;
        self.wofs = (self.wofs + 1) % WINDOW_SIZE;
    }

    fn add(&mut self, drop: u8, add: u8) {
        self.s1 = self
            .s1
            .wrapping_add(u32::from(add))
            .wrapping_sub(u32::from(drop));
        self.s2 = self
            .s2
            .wrapping_add(self.s1)
            .wrapping_sub(WINDOW_SIZE as u32 * (u32::from(drop) + CHAR_OFFSET));
    }

    /// Current 32-bit digest of the window.
    pub fn digest(&self) -> u32 {
        (self.s1 << 16) | (self.s2 & 0xffff)
    }

    /// Returns `true` when the low `bits` bits of the checksum are all ones.
    pub fn on_split(&self, bits: u32) -> bool {
        let mask = (1u32 << bits) - 1;
        self.s2 & mask == mask
    }
}

impl Default for RollSum {
    fn default() -> Self {
        Self::new()
    }
}
