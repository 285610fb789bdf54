//! # PN9 Whitening Sequence
//!
//! 9-bit LFSR (x^9 + x^5 + 1, seed 0x1FF) producing the data-whitening
//! sequence used by CC11xx radios. Output is LSB first: the low byte of the
//! register is the next output byte.
//!
//! The generator only produces the sequence. Whitening itself is an XOR of
//! the payload with these bytes and is left to the caller.

/// LFSR seed (all ones)
pub const PN9_SEED: u16 = 0x1FF;

/// Sequence period in bits
pub const PN9_PERIOD_BITS: u32 = 511;

const PN9_MASK: u16 = 0x1FF;

/// PN9 sequence generator
///
/// # Examples
///
/// ```
/// use obc_comms::pn9::Pn9;
///
/// let first: Vec<u8> = Pn9::new().take(4).collect();
/// assert_eq!(first, [0xFF, 0xE1, 0x1D, 0x9A]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pn9 {
    state: u16,
}

impl Default for Pn9 {
    fn default() -> Self {
        Self::new()
    }
}

impl Pn9 {
    /// Generator positioned at the start of the sequence
    pub const fn new() -> Self {
        Self { state: PN9_SEED }
    }

    /// Generator positioned `preroll` bytes into the sequence
    pub fn with_preroll(preroll: u32) -> Self {
        let mut pn9 = Self::new();
        pn9.skip_bytes(preroll);
        pn9
    }

    /// Advance the register one step
    fn step(&mut self) {
        let feedback = (self.state ^ (self.state >> 5)) & 1;
        self.state = ((self.state >> 1) | (feedback << 8)) & PN9_MASK;
    }

    /// Skip `bits` output bits
    ///
    /// The skip is reduced modulo the sequence period, so large offsets cost
    /// at most 510 steps.
    pub fn skip_bits(&mut self, bits: u64) {
        let steps = bits % PN9_PERIOD_BITS as u64;
        for _ in 0..steps {
            self.step();
        }
    }

    /// Skip `bytes` output bytes
    pub fn skip_bytes(&mut self, bytes: u32) {
        self.skip_bits(bytes as u64 * 8);
    }

    /// Next output bit (0 or 1)
    pub fn next_bit(&mut self) -> u8 {
        let bit = (self.state & 1) as u8;
        self.step();
        bit
    }

    /// Next output byte
    pub fn next_byte(&mut self) -> u8 {
        let byte = (self.state & 0xFF) as u8;
        for _ in 0..8 {
            self.step();
        }
        byte
    }

    /// Fill `buffer` with the next `buffer.len()` sequence bytes
    pub fn fill(&mut self, buffer: &mut [u8]) {
        for byte in buffer.iter_mut() {
            *byte = self.next_byte();
        }
    }
}

impl Iterator for Pn9 {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        Some(self.next_byte())
    }
}

/// Fill `buffer` with PN9 bytes starting `preroll` bytes into the sequence
///
/// The result depends only on `preroll` and `buffer.len()`, so a transmitter
/// and receiver can regenerate the same whitening stream independently and
/// resynchronise mid-stream by choosing a matching preroll.
///
/// # Examples
///
/// ```
/// use obc_comms::pn9::pn9;
///
/// let mut head = [0u8; 8];
/// let mut tail = [0u8; 5];
/// pn9(&mut head, 0);
/// pn9(&mut tail, 3);
/// assert_eq!(&head[3..], &tail);
/// ```
pub fn pn9(buffer: &mut [u8], preroll: u32) {
    Pn9::with_preroll(preroll).fill(buffer);
}
